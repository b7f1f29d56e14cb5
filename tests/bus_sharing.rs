//! Host-level tests for the shared bus: the render and control contexts run
//! concurrently and never split each other's critical sections.

mod common;

use common::{BusEvent, FakeBus};
use embassy_futures::join::join;
use embassy_futures::{block_on, yield_now};
use octo_clock::clock_face::ClockFace;
use octo_clock::rtc::{Ds3231, PersistentClock};
use octo_clock::scheduler::{AppContext, render_step};
use octo_clock::status::testing::RecordingStatus;
use octo_clock::status::{StatusLog, StatusPanel, StatusSink};
use octo_clock::surface::{Oled128x32, SSD1306_ADDRESS};
use octo_clock::{BitmapStore, EmbeddedAssets};

const TICKS: usize = 3;
/// Data writes per clock panel present: four 128-byte pages.
const PANEL_DATA_WRITES: usize = 4;
/// Window write plus eight pages.
const STATUS_PRESENT_WRITES: usize = 9;

fn interleaved_trace() -> Vec<BusEvent> {
    let store = block_on(BitmapStore::load(&EmbeddedAssets, &mut RecordingStatus::default())).unwrap();
    let ctx = AppContext::new(FakeBus::new());
    let mut face = block_on(ClockFace::bring_up(
        &store,
        &ctx.bus,
        |_| Oled128x32::new(SSD1306_ADDRESS),
        &mut RecordingStatus::default(),
    ));
    block_on(ctx.bus.lock()).i2c().clear_counts();

    let mut status = StatusLog::new(&ctx.bus, &ctx.clock, &ctx.address);
    let mut rtc = Ds3231::new(&ctx.bus);

    let render = async {
        for _ in 0..TICKS {
            ctx.request_full_refresh();
            let report = render_step(&ctx, &mut face).await;
            assert!(report.failed.is_empty());
            yield_now().await;
        }
    };
    let control = async {
        for _ in 0..TICKS {
            status.log("Button BACK is held down.").await;
            status.show_persistent_time(&mut rtc).await;
            rtc.read().await.unwrap();
            yield_now().await;
        }
    };
    block_on(join(render, control));

    let mut mux = block_on(ctx.bus.lock());
    assert_eq!(mux.i2c().presents.iter().sum::<u32>(), 8 * TICKS as u32);
    mux.i2c().trace.clone()
}

#[test]
fn every_panel_present_lands_on_the_channel_it_selected() {
    let trace = interleaved_trace();

    let mut windows = 0;
    for (index, event) in trace.iter().enumerate() {
        let BusEvent::PanelWindow(channel) = *event else {
            continue;
        };
        windows += 1;
        assert_eq!(trace[index - 1], BusEvent::Select(channel), "at {index}: {trace:?}");
        assert_eq!(
            trace[index + 1..=index + PANEL_DATA_WRITES],
            [BusEvent::PanelData(channel); PANEL_DATA_WRITES],
            "at {index}: {trace:?}"
        );
    }
    assert_eq!(windows, 8 * TICKS);
}

#[test]
fn status_presents_and_rtc_reads_stay_whole() {
    let trace = interleaved_trace();

    let mut runs = Vec::new();
    let mut run = 0;
    for event in &trace {
        if *event == BusEvent::Status {
            run += 1;
        } else if run > 0 {
            runs.push(run);
            run = 0;
        }
    }
    if run > 0 {
        runs.push(run);
    }
    // One log and one persistent-time screen per tick, never adjacent: an RTC read
    // always sits between them.
    assert_eq!(runs, vec![STATUS_PRESENT_WRITES; 2 * TICKS]);
    assert_eq!(trace.iter().filter(|event| **event == BusEvent::Rtc).count(), 2 * TICKS);
}

#[test]
fn both_contexts_make_progress_between_each_other() {
    let trace = interleaved_trace();

    let first_select = trace.iter().position(|event| matches!(event, BusEvent::Select(_)));
    let last_select = trace.iter().rposition(|event| matches!(event, BusEvent::Select(_)));
    let (Some(first), Some(last)) = (first_select, last_select) else {
        panic!("no channel was selected: {trace:?}");
    };
    assert!(
        trace[first..last]
            .iter()
            .any(|event| matches!(event, BusEvent::Status | BusEvent::Rtc)),
        "control traffic never ran between render ticks: {trace:?}"
    );
}
