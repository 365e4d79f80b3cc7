//! Stability detectors: touch idle, rotation settle, UI quiescence.
//!
//! Each detector polls one device signal until it settles or a deadline
//! passes. Rotation is the only one that escalates a timeout to an
//! error; the others report what they saw and let the caller decide.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use droidpilot_bridge::{DeviceBridge, TouchEventStream};
use droidpilot_core::gfx::GfxStats;
use droidpilot_core::observation::Rotation;
use droidpilot_core::prelude::*;

use crate::config::StabilityConfig;

/// What the UI stability detector observed.
#[derive(Debug, Clone)]
pub struct StabilityReport {
    /// Whether the frame pipeline went quiet within the deadline.
    pub stable: bool,
    /// How long the detector waited.
    pub waited: Duration,
    /// The last stats sample taken.
    pub stats: GfxStats,
}

/// Wait until no touch events arrive for the configured idle window.
///
/// Returns `true` once idle, `false` if the hard limit passed with the
/// user still interacting. A closed stream counts as idle; with no
/// event source there is nothing left to wait out.
pub async fn wait_touch_idle(
    stream: &mut TouchEventStream,
    config: &StabilityConfig,
) -> bool {
    let deadline = Instant::now() + config.touch_limit();
    loop {
        match timeout(config.touch_idle(), stream.recv()).await {
            // The idle window elapsed with no event.
            Err(_) => return true,
            Ok(None) => return true,
            Ok(Some(_)) => {
                if Instant::now() >= deadline {
                    warn!(
                        limit_ms = config.touch_limit_ms,
                        "touch stream never went idle, proceeding anyway"
                    );
                    return false;
                }
            }
        }
    }
}

/// Wait for the display to report the target rotation.
///
/// Rotation settles within a frame or two on healthy devices; a miss
/// here means the device ignored the request, so the timeout is a hard
/// error rather than a degraded observation.
pub async fn wait_rotation<B: DeviceBridge>(
    bridge: &B,
    serial: &str,
    target: Rotation,
    config: &StabilityConfig,
) -> Result<()> {
    let start = Instant::now();
    loop {
        if bridge.rotation(serial).await? == target {
            return Ok(());
        }
        if start.elapsed() >= config.rotation_timeout() {
            return Err(Error::RotationTimeout {
                target: target.degrees(),
                waited_ms: start.elapsed().as_millis() as u64,
            });
        }
        sleep(config.rotation_poll()).await;
    }
}

/// Wait for the app's frame pipeline to go quiet.
///
/// Quiet means the jank counters stop advancing and the frame time
/// percentiles sit under their ceilings, held continuously for the
/// configured window. The timeout degrades the report instead of
/// failing; a perpetually animating screen is still observable.
pub async fn wait_ui_stability<B: DeviceBridge>(
    bridge: &B,
    serial: &str,
    app_id: &str,
    config: &StabilityConfig,
) -> Result<StabilityReport> {
    let start = Instant::now();
    let mut last = bridge.gfx_stats(serial, app_id).await?;
    let mut quiet_since: Option<Instant> = None;

    loop {
        sleep(config.ui_poll()).await;
        let stats = bridge.gfx_stats(serial, app_id).await?;
        let delta = stats.counters.delta_since(&last.counters);
        let rendered = stats.total_frames > last.total_frames;
        last = stats.clone();

        let quiet = delta.is_quiet()
            && (!rendered
                || stats
                    .percentiles
                    .within_ceilings(config.tight_ceiling_ms, config.loose_ceiling_ms));

        if quiet {
            let since = *quiet_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= config.ui_hold() {
                return Ok(StabilityReport {
                    stable: true,
                    waited: start.elapsed(),
                    stats,
                });
            }
        } else {
            quiet_since = None;
        }

        if start.elapsed() >= config.ui_timeout() {
            warn!(
                waited_ms = start.elapsed().as_millis() as u64,
                "UI never stabilized within deadline"
            );
            return Ok(StabilityReport {
                stable: false,
                waited: start.elapsed(),
                stats,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBridge;
    use droidpilot_bridge::{TouchEvent, TouchEventKind};
    use droidpilot_core::gfx::{GfxCounters, GfxPercentiles};
    use tokio::sync::mpsc;

    fn config() -> StabilityConfig {
        StabilityConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_idle_on_silent_stream() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let mut stream = TouchEventStream::from_channel(rx);
        assert!(wait_touch_idle(&mut stream, &config()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_idle_after_burst() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = TouchEventStream::from_channel(rx);
        for i in 0..5 {
            tx.send(TouchEvent {
                timestamp_secs: i as f64 * 0.01,
                kind: TouchEventKind::Move,
            })
            .unwrap();
        }
        drop(tx);
        assert!(wait_touch_idle(&mut stream, &config()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_settles() {
        let bridge = FakeBridge::new();
        bridge.set_rotation_sequence(vec![Rotation::Deg0, Rotation::Deg0, Rotation::Deg90]);
        wait_rotation(&bridge, "emulator-5554", Rotation::Deg90, &config())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_timeout_is_hard_error() {
        let bridge = FakeBridge::new();
        bridge.set_rotation_sequence(vec![Rotation::Deg0]);
        let err = wait_rotation(&bridge, "emulator-5554", Rotation::Deg270, &config())
            .await
            .unwrap_err();
        match err {
            Error::RotationTimeout { target, waited_ms } => {
                assert_eq!(target, 270);
                assert!(waited_ms >= 500);
            }
            other => panic!("expected rotation timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ui_stability_quiet_pipeline() {
        let bridge = FakeBridge::new();
        let report = wait_ui_stability(&bridge, "emulator-5554", "com.example.app", &config())
            .await
            .unwrap();
        assert!(report.stable);
        assert!(report.waited >= config().ui_hold());
        // An already-quiet pipeline must converge as soon as the hold
        // window has been observed, give or take a few polls.
        assert!(report.waited <= config().ui_hold() + config().ui_poll() * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ui_stability_respects_percentile_ceilings() {
        let bridge = FakeBridge::new();
        // Frames keep rendering cleanly but slowly: counters stay quiet
        // while p95 sits over its ceiling.
        bridge.set_gfx_janky(GfxCounters::default());
        bridge.set_percentiles(GfxPercentiles {
            p50_ms: 8.0,
            p90_ms: 15.0,
            p95_ms: 300.0,
            p99_ms: 400.0,
        });
        let report = wait_ui_stability(&bridge, "emulator-5554", "com.example.app", &config())
            .await
            .unwrap();
        assert!(!report.stable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ui_stability_times_out_on_endless_jank() {
        let bridge = FakeBridge::new();
        bridge.set_gfx_janky(GfxCounters {
            missed_vsync: 1,
            slow_ui_thread: 0,
            frame_deadline_missed: 0,
        });
        let report = wait_ui_stability(&bridge, "emulator-5554", "com.example.app", &config())
            .await
            .unwrap();
        assert!(!report.stable);
        assert!(report.waited >= config().ui_timeout());
    }
}
