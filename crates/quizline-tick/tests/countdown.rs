//! Integration tests for the countdown ticker.
//!
//! Uses `start_paused = true` so Tokio's clock only moves when every task
//! is idle (auto-advance) or when the test calls `advance`. Timing
//! assertions are therefore exact.

use std::time::Duration;

use quizline_tick::{Countdown, CountdownConfig};
use tokio::time::Instant;

const SECOND: Duration = Duration::from_secs(1);

// =========================================================================
// Configuration
// =========================================================================

#[test]
fn test_default_config_is_one_second() {
    assert_eq!(CountdownConfig::default().interval, SECOND);
    assert_eq!(Countdown::default().interval(), SECOND);
}

#[test]
fn test_zero_interval_is_clamped() {
    let countdown = Countdown::with_interval(Duration::ZERO);
    assert_eq!(countdown.interval(), CountdownConfig::MIN_INTERVAL);
}

#[test]
fn test_new_countdown_is_disarmed() {
    let countdown = Countdown::default();
    assert!(!countdown.is_armed());
    assert_eq!(countdown.armed_epoch(), None);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_armed_countdown_fires_after_one_interval() {
    let mut countdown = Countdown::default();
    let start = Instant::now();
    countdown.arm(7);

    let tick = countdown.wait_for_tick().await;

    assert_eq!(tick.epoch, 7);
    assert_eq!(tick.tick, 1);
    assert_eq!(tick.skipped, 0);
    assert_eq!(start.elapsed(), SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_ten_ticks_take_ten_seconds() {
    let mut countdown = Countdown::default();
    let start = Instant::now();
    countdown.arm(1);

    for expected in 1..=10 {
        let tick = countdown.wait_for_tick().await;
        assert_eq!(tick.tick, expected);
    }

    assert_eq!(start.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_countdown_never_fires() {
    let mut countdown = Countdown::default();

    let result =
        tokio::time::timeout(Duration::from_secs(60), countdown.wait_for_tick())
            .await;

    assert!(result.is_err(), "a disarmed countdown must pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_disarm_stops_ticks() {
    let mut countdown = Countdown::default();
    countdown.arm(1);
    countdown.wait_for_tick().await;

    countdown.disarm();
    countdown.disarm();

    let result =
        tokio::time::timeout(Duration::from_secs(5), countdown.wait_for_tick())
            .await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_with_new_epoch_restarts_schedule() {
    let mut countdown = Countdown::default();
    countdown.arm(1);
    countdown.wait_for_tick().await;
    tokio::time::advance(Duration::from_millis(600)).await;

    let rearmed_at = Instant::now();
    countdown.arm(2);
    let tick = countdown.wait_for_tick().await;

    assert_eq!(tick.epoch, 2);
    assert_eq!(tick.tick, 1);
    assert_eq!(rearmed_at.elapsed(), SECOND);
}

// =========================================================================
// sync()
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_sync_same_epoch_keeps_running_schedule() {
    let mut countdown = Countdown::default();
    let start = Instant::now();
    countdown.sync(Some(3));
    tokio::time::advance(Duration::from_millis(400)).await;

    countdown.sync(Some(3));
    countdown.wait_for_tick().await;

    assert_eq!(start.elapsed(), SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_sync_none_disarms() {
    let mut countdown = Countdown::default();
    countdown.sync(Some(3));
    assert_eq!(countdown.armed_epoch(), Some(3));

    countdown.sync(None);

    assert!(!countdown.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_sync_new_epoch_rearms() {
    let mut countdown = Countdown::default();
    countdown.sync(Some(3));
    countdown.wait_for_tick().await;

    countdown.sync(Some(4));
    let tick = countdown.wait_for_tick().await;

    assert_eq!(tick.epoch, 4);
    assert_eq!(tick.tick, 1);
}

// =========================================================================
// Cancellation and lateness
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_is_cancel_safe() {
    let mut countdown = Countdown::default();
    let start = Instant::now();
    countdown.arm(1);

    tokio::select! {
        _ = countdown.wait_for_tick() => panic!("tick fired too early"),
        _ = tokio::time::sleep(Duration::from_millis(300)) => {}
    }

    let tick = countdown.wait_for_tick().await;
    assert_eq!(tick.tick, 1);
    assert_eq!(start.elapsed(), SECOND);
}

#[tokio::test(start_paused = true)]
async fn test_late_tick_reports_skipped_intervals() {
    let mut countdown = Countdown::default();
    countdown.arm(1);

    tokio::time::advance(Duration::from_millis(3500)).await;
    let tick = countdown.wait_for_tick().await;

    assert_eq!(tick.tick, 1);
    assert_eq!(tick.skipped, 2);

    // The schedule resumes one interval from the late tick.
    let resumed_at = Instant::now();
    countdown.wait_for_tick().await;
    assert_eq!(resumed_at.elapsed(), SECOND);
}
