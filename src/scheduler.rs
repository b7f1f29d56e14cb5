//! The two execution contexts and the state they share.
//!
//! The render context ticks the [`ClockFace`] forever. The control context runs the
//! startup sequence, then polls the button flags and dispatches one
//! [`ControlAction`] per held button on every poll.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::fmt::Write as _;

use embassy_time::{Duration, Timer};
use embedded_hal_async::i2c::I2c;
use heapless::{String, Vec};
use portable_atomic::{AtomicBool, Ordering};

use crate::buttons::{Button, ButtonStates};
use crate::clock::LiveClock;
use crate::clock_face::{ClockFace, TickReport};
use crate::config::WifiCredentials;
use crate::mux::{SharedBus, Tca9548a};
use crate::network::{AddressCell, AssociationConfig, WifiLink, associate};
use crate::ntp::NetworkTime;
use crate::rtc::PersistentClock;
use crate::status::StatusPanel;
use crate::surface::PixelSurface;
use crate::time_sync::TimeSync;
use crate::tone::{Tone, startup_cue};
use crate::unix_seconds::{TimeSample, TimeSource};

// ============================================================================
// Shared state
// ============================================================================

/// Everything both contexts touch. Build it once and hand out `&AppContext`.
///
/// The bus is the only mutable resource that needs a lock held across an await; the
/// rest are atomics or short critical sections.
pub struct AppContext<I2C> {
    pub bus: SharedBus<I2C>,
    pub buttons: ButtonStates,
    /// Written only by WiFi association.
    pub address: AddressCell,
    /// Written only by the control context.
    pub clock: LiveClock,
    full_refresh: AtomicBool,
}

impl<I2C: I2c> AppContext<I2C> {
    #[must_use]
    pub const fn new(i2c: I2C) -> Self {
        Self {
            bus: SharedBus::new(Tca9548a::new(i2c)),
            buttons: ButtonStates::new(),
            address: AddressCell::new(),
            clock: LiveClock::new(),
            full_refresh: AtomicBool::new(false),
        }
    }
}

impl<I2C> AppContext<I2C> {
    /// Ask the render context to redraw every cell on its next tick.
    pub fn request_full_refresh(&self) {
        self.full_refresh.store(true, Ordering::Release);
    }

    /// Consume a pending full-refresh request.
    pub fn take_full_refresh(&self) -> bool {
        self.full_refresh.swap(false, Ordering::AcqRel)
    }
}

/// Cadences of both loops and the association wait.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    pub render_period: Duration,
    pub control_period: Duration,
    pub association: AssociationConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            render_period: Duration::from_millis(100),
            control_period: Duration::from_millis(100),
            association: AssociationConfig::default(),
        }
    }
}

// ============================================================================
// Render context
// ============================================================================

/// One render tick: honor a pending full refresh, then draw the current time.
pub async fn render_step<I: I2c, S: PixelSurface>(
    ctx: &AppContext<I>,
    face: &mut ClockFace<'_, S>,
) -> TickReport {
    if ctx.take_full_refresh() {
        face.invalidate();
    }
    let now = ctx.clock.now();
    face.tick(&ctx.bus, &now).await
}

/// Tick the clock face every `period`, forever.
pub async fn run_render_loop<I: I2c, S: PixelSurface>(
    ctx: &AppContext<I>,
    face: &mut ClockFace<'_, S>,
    period: Duration,
) -> ! {
    loop {
        let report = render_step(ctx, face).await;
        if !report.failed.is_empty() {
            warn!("render: {} channel(s) failed to present", report.failed.len());
        }
        Timer::after(period).await;
    }
}

// ============================================================================
// Control context
// ============================================================================

/// What a held button does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlAction {
    /// Redraw every clock cell.
    FullRefresh,
    /// Show the live clock on the status display.
    ShowLiveTime,
    /// Run the time synchronizer again.
    Resynchronize,
    /// Show the persistent clock on the status display.
    ShowPersistentTime,
}

impl From<Button> for ControlAction {
    fn from(button: Button) -> Self {
        match button {
            Button::Up => Self::FullRefresh,
            Button::Down => Self::ShowLiveTime,
            Button::Enter => Self::Resynchronize,
            Button::Back => Self::ShowPersistentTime,
        }
    }
}

/// Actions taken by one [`Controller::poll_once`], in dispatch order.
pub type Dispatched = Vec<ControlAction, 4>;

/// The control context: startup, then button polling.
pub struct Controller<'a, I2C, D, N, P, W, T> {
    ctx: &'a AppContext<I2C>,
    status: D,
    sync: TimeSync<'a, N, P>,
    wifi: W,
    tone: T,
    credentials: WifiCredentials,
    config: SchedulerConfig,
}

impl<'a, I2C, D, N, P, W, T> Controller<'a, I2C, D, N, P, W, T>
where
    D: StatusPanel,
    N: NetworkTime,
    P: PersistentClock,
    W: WifiLink,
    T: Tone,
{
    #[must_use]
    pub const fn new(
        ctx: &'a AppContext<I2C>,
        status: D,
        sync: TimeSync<'a, N, P>,
        wifi: W,
        tone: T,
        credentials: WifiCredentials,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            ctx,
            status,
            sync,
            wifi,
            tone,
            credentials,
            config,
        }
    }

    pub const fn status(&mut self) -> &mut D {
        &mut self.status
    }

    pub const fn sync(&mut self) -> &mut TimeSync<'a, N, P> {
        &mut self.sync
    }

    /// Seed the live clock from the persistent clock, play the cue, join WiFi and
    /// synchronize with the network.
    ///
    /// Nothing here is fatal. A failed association skips the first synchronization;
    /// the enter button can still request one later.
    pub async fn startup(&mut self) {
        self.status.log("Starting initialization...").await;
        self.seed_from_persistent_clock().await;

        startup_cue(&mut self.tone, &mut self.status).await;

        match associate(
            &mut self.wifi,
            &self.credentials,
            &self.ctx.address,
            self.config.association,
            &mut self.status,
        )
        .await
        {
            Ok(_) => {
                self.sync.synchronize(&mut self.status).await;
            }
            Err(err) => {
                let mut message: String<64> = String::new();
                let _ = write!(message, "Skipping NTP sync: {err}");
                self.status.log(&message).await;
            }
        }

        self.status.log("Initialization complete.").await;
    }

    async fn seed_from_persistent_clock(&mut self) {
        let offset = self.sync.config().utc_offset();
        let seeded = self
            .sync
            .rtc()
            .read()
            .await
            .and_then(|value| value.to_unix_seconds(offset));
        match seeded {
            Ok(unix_seconds) => self.ctx.clock.set(
                TimeSample::new(unix_seconds, TimeSource::PersistentClock),
                offset,
            ),
            Err(err) => {
                let mut message: String<64> = String::new();
                let _ = write!(message, "Failed to read RTC: {err}");
                self.status.log(&message).await;
            }
        }
    }

    /// Report new presses, then act on each button held, in [`Button::ALL`] order.
    pub async fn poll_once(&mut self) -> Dispatched {
        let ctx = self.ctx;
        for button in ctx.buttons.take_presses() {
            let mut message: String<32> = String::new();
            let _ = write!(message, "Button {} pressed", button.name());
            self.status.log(&message).await;
        }

        let mut dispatched = Dispatched::new();
        for button in ctx.buttons.held() {
            let mut message: String<32> = String::new();
            let _ = write!(message, "Button {} is held down.", button.name());
            self.status.log(&message).await;

            let action = ControlAction::from(button);
            self.dispatch(action).await;
            let _ = dispatched.push(action);
        }
        dispatched
    }

    /// Carry out one action.
    pub async fn dispatch(&mut self, action: ControlAction) {
        debug!("control: {:?}", action);
        match action {
            ControlAction::FullRefresh => self.ctx.request_full_refresh(),
            ControlAction::ShowLiveTime => self.status.show_live_time().await,
            ControlAction::Resynchronize => {
                self.sync.synchronize(&mut self.status).await;
            }
            ControlAction::ShowPersistentTime => {
                self.status.show_persistent_time(self.sync.rtc()).await;
            }
        }
    }

    /// Start up, then poll the buttons every control period, forever.
    pub async fn run(mut self) -> ! {
        self.startup().await;
        loop {
            self.poll_once().await;
            Timer::after(self.config.control_period).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh1::i2c::Mock;

    #[test]
    fn buttons_map_to_their_actions() {
        let actions: std::vec::Vec<ControlAction> =
            Button::ALL.into_iter().map(ControlAction::from).collect();
        assert_eq!(
            actions,
            [
                ControlAction::FullRefresh,
                ControlAction::ShowLiveTime,
                ControlAction::Resynchronize,
                ControlAction::ShowPersistentTime,
            ]
        );
    }

    #[test]
    fn full_refresh_request_is_consumed_once() {
        let ctx = AppContext::new(Mock::new(&[]));
        assert!(!ctx.take_full_refresh());

        ctx.request_full_refresh();
        ctx.request_full_refresh();
        assert!(ctx.take_full_refresh());
        assert!(!ctx.take_full_refresh());

        ctx.bus.into_inner().release().done();
    }

    // The flag is usable wherever the context is, whatever the bus type.
    fn press_up<I>(ctx: &AppContext<I>) {
        ctx.request_full_refresh();
    }

    #[test]
    fn full_refresh_flag_needs_no_bus_bound() {
        let ctx = AppContext::new(Mock::new(&[]));
        press_up(&ctx);
        assert!(ctx.take_full_refresh());

        ctx.bus.into_inner().release().done();
    }

    #[test]
    fn default_cadence_is_a_tenth_of_a_second() {
        let config = SchedulerConfig::default();
        assert_eq!(config.render_period, Duration::from_millis(100));
        assert_eq!(config.control_period, Duration::from_millis(100));
        assert_eq!(config.association.timeout, None);
    }
}
