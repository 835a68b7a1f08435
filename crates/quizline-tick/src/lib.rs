//! Wall-clock countdown ticker for Quizline.
//!
//! A [`Countdown`] fires once per interval (one second by default) while
//! it is armed, and never while it is disarmed. Every arming carries an
//! *epoch*, a number chosen by the caller to identify what the ticks
//! belong to (the question instance, for the quiz session). Each
//! [`CountdownTick`] reports the epoch it was armed with, so the receiver
//! can tell a tick for the current question from one that was already in
//! flight when the question changed.
//!
//! # Integration
//!
//! The ticker sits inside the node's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* local intent */ }
//!         Some(event) = transport.next_event() => { /* network */ }
//!         tick = countdown.wait_for_tick() => {
//!             session.countdown_tick(tick.epoch);
//!         }
//!     }
//!     countdown.sync(session.countdown_epoch());
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`Countdown`].
#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Time between ticks. Default: one second.
    pub interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl CountdownConfig {
    /// Smallest accepted interval; anything below is clamped.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    /// Create a config with a specific interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval = ?self.interval,
                "countdown interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// One fired tick, returned by [`Countdown::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    /// The epoch the countdown was armed with.
    pub epoch: u64,
    /// Ticks fired since that arming (starts at 1).
    pub tick: u64,
    /// Whole intervals that were skipped because the tick fired late.
    pub skipped: u64,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    epoch: u64,
    next: Instant,
    ticks: u64,
}

// ---------------------------------------------------------------------------
// Countdown
// ---------------------------------------------------------------------------

/// An armable, epoch-tagged periodic ticker.
#[derive(Debug)]
pub struct Countdown {
    interval: Duration,
    armed: Option<Armed>,
}

impl Countdown {
    /// Create a disarmed countdown.
    pub fn new(config: CountdownConfig) -> Self {
        let config = config.validated();
        Self {
            interval: config.interval,
            armed: None,
        }
    }

    /// Create a disarmed countdown ticking every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(CountdownConfig::with_interval(interval))
    }

    /// Start ticking for `epoch`. The first tick fires one interval from
    /// now. Re-arming replaces any previous schedule.
    pub fn arm(&mut self, epoch: u64) {
        self.armed = Some(Armed {
            epoch,
            next: Instant::now() + self.interval,
            ticks: 0,
        });
        debug!(epoch, interval = ?self.interval, "countdown armed");
    }

    /// Stop ticking. Idempotent.
    pub fn disarm(&mut self) {
        if let Some(armed) = self.armed.take() {
            debug!(epoch = armed.epoch, ticks = armed.ticks, "countdown disarmed");
        }
    }

    /// Bring the countdown in line with what the caller wants:
    /// armed for `Some(epoch)`, disarmed for `None`. Arming only happens
    /// when the epoch actually changes, so calling this after every event
    /// doesn't disturb a running schedule.
    pub fn sync(&mut self, wanted: Option<u64>) {
        match wanted {
            Some(epoch) if self.armed_epoch() != Some(epoch) => self.arm(epoch),
            Some(_) => {}
            None => self.disarm(),
        }
    }

    /// The epoch currently armed, if any.
    pub fn armed_epoch(&self) -> Option<u64> {
        self.armed.map(|a| a.epoch)
    }

    /// Whether the countdown is armed.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next tick.
    ///
    /// While disarmed this future pends forever, which lets `select!`
    /// keep serving its other branches. Cancel-safe: state only changes
    /// after the sleep completes.
    pub async fn wait_for_tick(&mut self) -> CountdownTick {
        let Some(armed) = self.armed else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(armed.next).await;

        let now = Instant::now();
        let late_by = now.saturating_duration_since(armed.next);
        let skipped =
            (late_by.as_nanos() / self.interval.as_nanos().max(1)) as u64;

        // Keep the original cadence unless whole intervals were missed;
        // then resume from now instead of bursting.
        let next = if skipped > 0 {
            warn!(
                epoch = armed.epoch,
                skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "countdown tick late, skipping ahead"
            );
            now + self.interval
        } else {
            armed.next + self.interval
        };

        let ticks = armed.ticks + 1;
        self.armed = Some(Armed {
            epoch: armed.epoch,
            next,
            ticks,
        });
        trace!(epoch = armed.epoch, tick = ticks, "countdown tick");

        CountdownTick {
            epoch: armed.epoch,
            tick: ticks,
            skipped,
        }
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(CountdownConfig::default())
    }
}
