//! Octo Clock - eight OLED panels showing `HH:MM:SS`, kept on time by NTP
//!
//! Wiring (Pico 1W):
//! - I2C0: SDA on GP4, SCL on GP5. The TCA9548A (0x70), the 128x64 status panel
//!   (0x3D) and the DS3231 (0x68) sit on the bus; the eight 128x32 clock panels (0x3C)
//!   hang off multiplexer channels 0..7.
//! - Buttons to ground: UP GP10, DOWN GP11, ENTER GP12, BACK GP13.
//! - Passive buzzer on GP15.
//!
//! Put `SSID=...` and `PASSWORD=...` in `wifi_config.txt` before building. Set
//! `UTC_OFFSET_HOURS` and optionally `NTP_HOST` in `.env`.
//!
//! Run with: `cargo run --example octo_clock --features pico1,wifi,defmt --target thumbv6m-none-eabi`

#![no_std]
#![no_main]
#![allow(clippy::future_not_send, reason = "single-threaded")]

use core::convert::Infallible;

use cyw43_pio::PioSpi;
use defmt::info;
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_net::{Config, StackResources};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::i2c::{self, Async, I2c};
use embassy_rp::peripherals::{DMA_CH0, I2C0, PIO0};
use embassy_rp::pio::{self, Pio};
use octo_clock::buttons::{Button, ButtonStates, watch_button};
use octo_clock::config::{EMBEDDED_WIFI_CONFIG, load_wifi_config, sync_config};
use octo_clock::network::Cyw43Link;
use octo_clock::ntp::StackNetworkTime;
use octo_clock::rtc::Ds3231;
use octo_clock::scheduler::{AppContext, Controller, SchedulerConfig, run_render_loop};
use octo_clock::surface::{Oled128x32, SSD1306_ADDRESS};
use octo_clock::tone::SquareWaveTone;
use octo_clock::{BitmapStore, ClockFace, EmbeddedAssets, Result, StatusLog, StatusSink, TimeSync};
use panic_probe as _;
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => pio::InterruptHandler<PIO0>;
    I2C0_IRQ => i2c::InterruptHandler<I2C0>;
});

type Bus = I2c<'static, I2C0, Async>;
type Face = ClockFace<'static, Oled128x32>;

// ============================================================================
// Main
// ============================================================================

#[embassy_executor::main]
pub async fn main(spawner: Spawner) -> ! {
    let err = inner_main(spawner).await.unwrap_err();
    core::panic!("{err}");
}

async fn inner_main(spawner: Spawner) -> Result<Infallible> {
    info!("Starting Octo Clock");
    let p = embassy_rp::init(Default::default());
    let config = SchedulerConfig::default();

    // Shared state for both contexts
    static CONTEXT: StaticCell<AppContext<Bus>> = StaticCell::new();
    let i2c = I2c::new_async(p.I2C0, p.PIN_5, p.PIN_4, Irqs, i2c::Config::default());
    let ctx: &'static AppContext<Bus> = CONTEXT.init(AppContext::new(i2c));

    // Status panel first, so everything after it can report progress
    let mut status = StatusLog::new(&ctx.bus, &ctx.clock, &ctx.address);
    if status.init().await.is_err() {
        defmt::warn!("status display did not answer; continuing without it");
    }

    // Glyphs and clock panels
    static STORE: StaticCell<BitmapStore> = StaticCell::new();
    let store: &'static BitmapStore =
        STORE.init(BitmapStore::load(&EmbeddedAssets, &mut status).await?);
    let face: Face = ClockFace::bring_up(
        store,
        &ctx.bus,
        |_| Oled128x32::new(SSD1306_ADDRESS),
        &mut status,
    )
    .await;
    let credentials = load_wifi_config(EMBEDDED_WIFI_CONFIG, &mut status).await;

    // Buttons
    let buttons = [
        (Button::Up, Input::new(p.PIN_10, Pull::Up)),
        (Button::Down, Input::new(p.PIN_11, Pull::Up)),
        (Button::Enter, Input::new(p.PIN_12, Pull::Up)),
        (Button::Back, Input::new(p.PIN_13, Pull::Up)),
    ];
    for (button, pin) in buttons {
        spawner.spawn(button_task(pin, button, &ctx.buttons))?;
    }

    // WiFi radio and network stack
    let fw = cyw43_firmware::CYW43_43439A0;
    let clm = cyw43_firmware::CYW43_43439A0_CLM;
    let pwr = Output::new(p.PIN_23, Level::Low);
    let cs = Output::new(p.PIN_25, Level::High);
    let mut pio = Pio::new(p.PIO0, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        pio.irq0,
        cs,
        p.PIN_24,
        p.PIN_29,
        p.DMA_CH0,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.spawn(wifi_task(runner))?;
    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    static RESOURCES: StaticCell<StackResources<3>> = StaticCell::new();
    let (stack, net_runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(Default::default()),
        RESOURCES.init(StackResources::new()),
        0x0bad_cafe_dead_beef,
    );
    spawner.spawn(net_task(net_runner))?;

    // Render context
    spawner.spawn(render_task(ctx, face, config))?;
    status.log("Display refresh started").await;

    // Control context runs on this task
    let sync = TimeSync::new(
        StackNetworkTime::new(stack),
        Ds3231::new(&ctx.bus),
        &ctx.clock,
        sync_config(),
    );
    let controller = Controller::new(
        ctx,
        status,
        sync,
        Cyw43Link::new(control, stack),
        SquareWaveTone::new(Output::new(p.PIN_15, Level::Low)),
        credentials,
        config,
    );
    controller.run().await
}

// ============================================================================
// Tasks
// ============================================================================

#[embassy_executor::task]
async fn render_task(ctx: &'static AppContext<Bus>, mut face: Face, config: SchedulerConfig) -> ! {
    run_render_loop(ctx, &mut face, config.render_period).await
}

#[embassy_executor::task(pool_size = 4)]
async fn button_task(pin: Input<'static>, button: Button, states: &'static ButtonStates) -> ! {
    watch_button(pin, button, states).await
}

#[embassy_executor::task]
async fn wifi_task(runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}
