//! Four front-panel buttons, exposed to the control loop as level flags.

#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use embassy_time::{Duration, Timer};
use embedded_hal::digital::InputPin;
use embedded_hal_async::digital::Wait;
use portable_atomic::{AtomicBool, Ordering};

pub const BUTTON_DEBOUNCE_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Up,
    Down,
    Enter,
    Back,
}

impl Button {
    /// Polling order of the control loop.
    pub const ALL: [Self; 4] = [Self::Up, Self::Down, Self::Enter, Self::Back];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
            Self::Enter => "ENTER",
            Self::Back => "BACK",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Enter => 2,
            Self::Back => 3,
        }
    }
}

/// Held/not-held flag per button, plus a "pressed since last asked" flag.
///
/// Written by the edge watchers, read by the control loop. Each flag is independent;
/// a reader may see a press one poll late, never a torn value.
pub struct ButtonStates {
    held: [AtomicBool; 4],
    pressed: [AtomicBool; 4],
}

impl Default for ButtonStates {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonStates {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: [const { AtomicBool::new(false) }; 4],
            pressed: [const { AtomicBool::new(false) }; 4],
        }
    }

    /// Set the level flag only. No press is recorded.
    pub fn set(&self, button: Button, held: bool) {
        if let Some(flag) = self.held.get(button.index()) {
            flag.store(held, Ordering::Release);
        }
    }

    /// A debounced press: the button is held and a press is pending.
    pub fn press(&self, button: Button) {
        self.set(button, true);
        if let Some(flag) = self.pressed.get(button.index()) {
            flag.store(true, Ordering::Release);
        }
    }

    #[must_use]
    pub fn is_held(&self, button: Button) -> bool {
        self.held
            .get(button.index())
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    /// Consume a pending press of `button`.
    pub fn take_press(&self, button: Button) -> bool {
        self.pressed
            .get(button.index())
            .is_some_and(|flag| flag.swap(false, Ordering::AcqRel))
    }

    /// Consume every pending press, in [`Button::ALL`] order.
    pub fn take_presses(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL
            .into_iter()
            .filter(move |button| self.take_press(*button))
    }

    /// Every held button, in [`Button::ALL`] order.
    pub fn held(&self) -> impl Iterator<Item = Button> + '_ {
        Button::ALL
            .into_iter()
            .filter(move |button| self.is_held(*button))
    }
}

/// Track one active-low button forever, keeping its flag in `states` current.
///
/// Both edges are debounced. The flag only goes up if the pin is still low once the
/// contacts have settled.
pub async fn watch_button<P>(mut pin: P, button: Button, states: &ButtonStates) -> !
where
    P: Wait<Error = Infallible> + InputPin<Error = Infallible>,
{
    loop {
        let Ok(()) = pin.wait_for_falling_edge().await;
        Timer::after(BUTTON_DEBOUNCE_DELAY).await;
        let Ok(pressed) = pin.is_low();
        if !pressed {
            continue;
        }
        states.press(button);
        info!("Button {} pressed", button.name());

        let Ok(()) = pin.wait_for_high().await;
        Timer::after(BUTTON_DEBOUNCE_DELAY).await;
        states.set(button, false);
        debug!("Button {} released", button.name());
    }
}
