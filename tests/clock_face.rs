//! Host-level tests for the clock face: change detection, degraded panels, full refresh.

mod common;

use common::FakeBus;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use octo_clock::clock_face::ClockFace;
use octo_clock::mux::{SharedBus, Tca9548a};
use octo_clock::scheduler::{AppContext, render_step};
use octo_clock::status::testing::RecordingStatus;
use octo_clock::surface::{Oled128x32, SSD1306_ADDRESS};
use octo_clock::{BitmapStore, EmbeddedAssets};
use time::{Date, Month, OffsetDateTime, Time};

fn at(hour: u8, minute: u8, second: u8) -> OffsetDateTime {
    Date::from_calendar_date(2024, Month::March, 9)
        .unwrap()
        .with_time(Time::from_hms(hour, minute, second).unwrap())
        .assume_utc()
}

fn store() -> BitmapStore {
    block_on(BitmapStore::load(&EmbeddedAssets, &mut RecordingStatus::default())).unwrap()
}

fn shared(bus: FakeBus) -> SharedBus<FakeBus> {
    Mutex::<CriticalSectionRawMutex, _>::new(Tca9548a::new(bus))
}

fn bring_up<'a>(
    store: &'a BitmapStore,
    bus: &SharedBus<FakeBus>,
    status: &mut RecordingStatus,
) -> ClockFace<'a, Oled128x32> {
    let face = block_on(ClockFace::bring_up(
        store,
        bus,
        |_| Oled128x32::new(SSD1306_ADDRESS),
        status,
    ));
    block_on(bus.lock()).i2c().clear_counts();
    face
}

fn presented(bus: &SharedBus<FakeBus>) -> Vec<u8> {
    let mut mux = block_on(bus.lock());
    let channels = mux.i2c().presented_channels();
    mux.i2c().clear_counts();
    channels
}

#[test]
fn same_time_twice_presents_once() {
    let store = store();
    let bus = shared(FakeBus::new());
    let mut face = bring_up(&store, &bus, &mut RecordingStatus::default());

    let first = block_on(face.tick(&bus, &at(12, 34, 56)));
    assert_eq!(first.redrawn.len(), 8);
    assert_eq!(presented(&bus), [0, 1, 2, 3, 4, 5, 6, 7]);

    let second = block_on(face.tick(&bus, &at(12, 34, 56)));
    assert!(second.redrawn.is_empty());
    assert!(presented(&bus).is_empty());
}

#[test]
fn a_second_changes_at_most_four_cells() {
    let store = store();
    let bus = shared(FakeBus::new());
    let mut face = bring_up(&store, &bus, &mut RecordingStatus::default());
    block_on(face.tick(&bus, &at(8, 15, 0)));
    presented(&bus);

    for second in 1..60 {
        let report = block_on(face.tick(&bus, &at(8, 15, second)));
        let channels = presented(&bus);

        assert!(report.redrawn.len() <= 4, "second {second}: {channels:?}");
        assert_eq!(report.redrawn.iter().collect::<Vec<_>>(), channels);
        for untouched in [0, 1, 3, 4] {
            assert!(!channels.contains(&untouched), "second {second}: {channels:?}");
        }
        // Both separators and the units digit change every second.
        assert!(channels.contains(&2) && channels.contains(&5) && channels.contains(&7));
    }
}

#[test]
fn dead_panel_is_left_out_and_the_rest_keep_running() {
    let store = store();
    let bus = shared(FakeBus::with_dead_channels(1 << 3));
    let mut status = RecordingStatus::default();
    let mut face = bring_up(&store, &bus, &mut status);

    assert!(status.contains("Display 0 initialized successfully."));
    assert!(
        status
            .lines
            .iter()
            .any(|line| line.starts_with("Failed to initialize display 3:"))
    );
    assert!(!face.active_channels().contains(3));
    assert_eq!(face.active_channels().len(), 7);

    let report = block_on(face.tick(&bus, &at(10, 10, 10)));
    assert!(report.failed.is_empty());
    assert_eq!(presented(&bus), [0, 1, 2, 4, 5, 6, 7]);
    assert_eq!(face.cells()[3].last_rendered(), None);
}

#[test]
fn failed_present_is_retried_next_tick() {
    let store = store();
    let bus = shared(FakeBus::new());
    let mut face = bring_up(&store, &bus, &mut RecordingStatus::default());

    block_on(bus.lock()).i2c().dead = 1 << 6;
    let report = block_on(face.tick(&bus, &at(9, 0, 0)));
    assert!(report.failed.contains(6));
    assert_eq!(face.cells()[6].last_rendered(), None);

    block_on(bus.lock()).i2c().dead = 0;
    presented(&bus);
    let retry = block_on(face.tick(&bus, &at(9, 0, 0)));
    assert!(retry.failed.is_empty());
    assert_eq!(presented(&bus), [6]);
}

#[test]
fn full_refresh_request_redraws_every_active_cell() {
    let store = store();
    let ctx = AppContext::new(FakeBus::new());
    let mut face = bring_up(&store, &ctx.bus, &mut RecordingStatus::default());

    block_on(render_step(&ctx, &mut face));
    presented(&ctx.bus);

    ctx.request_full_refresh();
    let report = block_on(render_step(&ctx, &mut face));
    assert_eq!(report.redrawn, face.active_channels());
    assert_eq!(presented(&ctx.bus), [0, 1, 2, 3, 4, 5, 6, 7]);
    assert!(!ctx.take_full_refresh());
}
