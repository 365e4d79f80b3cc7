//! Frame rendering metric types
//!
//! Shared vocabulary between `droidpilot-bridge` (parsing `dumpsys gfxinfo`
//! output) and `droidpilot-engine` (the UI stability detector).
//!
//! The counters are cumulative since the last reset; the stability detector
//! works on per-poll deltas, not absolute values.

use chrono::{DateTime, Utc};

/// Default ceiling for the 50th/90th percentile frame latency, in ms.
pub const P50_P90_CEILING_MS: f64 = 100.0;

/// Looser default ceiling for the 95th percentile frame latency, in ms.
pub const P95_CEILING_MS: f64 = 200.0;

/// Cumulative frame-drop counters from `dumpsys gfxinfo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GfxCounters {
    /// Frames that missed their vsync deadline.
    pub missed_vsync: u64,
    /// Frames where the UI thread took too long.
    pub slow_ui_thread: u64,
    /// Frames that missed the overall frame deadline ("janky frames").
    pub frame_deadline_missed: u64,
}

impl GfxCounters {
    /// Per-field delta since an earlier snapshot of the same epoch.
    ///
    /// A counter reset between snapshots makes the cumulative value go
    /// backwards; that is treated as activity, not stability, by saturating
    /// to the new absolute value.
    pub fn delta_since(&self, earlier: &GfxCounters) -> GfxCounters {
        fn delta(now: u64, then: u64) -> u64 {
            if now >= then {
                now - then
            } else {
                now
            }
        }
        GfxCounters {
            missed_vsync: delta(self.missed_vsync, earlier.missed_vsync),
            slow_ui_thread: delta(self.slow_ui_thread, earlier.slow_ui_thread),
            frame_deadline_missed: delta(self.frame_deadline_missed, earlier.frame_deadline_missed),
        }
    }

    /// Whether no counter advanced, i.e. the render pipeline produced
    /// no janky frames during the interval.
    pub fn is_quiet(&self) -> bool {
        self.missed_vsync == 0 && self.slow_ui_thread == 0 && self.frame_deadline_missed == 0
    }
}

/// Percentile frame latencies from `dumpsys gfxinfo`, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GfxPercentiles {
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

impl GfxPercentiles {
    /// Whether latencies are under the given ceilings: p50 and p90 below
    /// `tight_ms`, p95 below `loose_ms`. The p99 is reported but not
    /// gated; a single cold-start frame should not hold stability
    /// hostage.
    pub fn within_ceilings(&self, tight_ms: f64, loose_ms: f64) -> bool {
        self.p50_ms < tight_ms && self.p90_ms < tight_ms && self.p95_ms < loose_ms
    }
}

/// One `dumpsys gfxinfo` snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GfxStats {
    pub counters: GfxCounters,
    pub percentiles: GfxPercentiles,
    /// Total frames rendered since the last reset.
    pub total_frames: u64,
    pub timestamp: DateTime<Utc>,
}

impl GfxStats {
    pub fn new(counters: GfxCounters, percentiles: GfxPercentiles, total_frames: u64) -> Self {
        Self {
            counters,
            percentiles,
            total_frames,
            timestamp: Utc::now(),
        }
    }
}

impl Default for GfxStats {
    fn default() -> Self {
        Self::new(GfxCounters::default(), GfxPercentiles::default(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_since_normal() {
        let earlier = GfxCounters {
            missed_vsync: 5,
            slow_ui_thread: 2,
            frame_deadline_missed: 10,
        };
        let now = GfxCounters {
            missed_vsync: 7,
            slow_ui_thread: 2,
            frame_deadline_missed: 13,
        };
        let delta = now.delta_since(&earlier);
        assert_eq!(delta.missed_vsync, 2);
        assert_eq!(delta.slow_ui_thread, 0);
        assert_eq!(delta.frame_deadline_missed, 3);
        assert!(!delta.is_quiet());
    }

    #[test]
    fn test_delta_since_identical_is_quiet() {
        let snap = GfxCounters {
            missed_vsync: 40,
            slow_ui_thread: 12,
            frame_deadline_missed: 99,
        };
        assert!(snap.delta_since(&snap).is_quiet());
    }

    #[test]
    fn test_delta_since_counter_reset() {
        let earlier = GfxCounters {
            missed_vsync: 50,
            slow_ui_thread: 50,
            frame_deadline_missed: 50,
        };
        let now = GfxCounters {
            missed_vsync: 3,
            slow_ui_thread: 0,
            frame_deadline_missed: 1,
        };
        let delta = now.delta_since(&earlier);
        // A reset mid-interval reports the new absolute values.
        assert_eq!(delta.missed_vsync, 3);
        assert_eq!(delta.slow_ui_thread, 0);
        assert_eq!(delta.frame_deadline_missed, 1);
        assert!(!delta.is_quiet());
    }

    #[test]
    fn test_percentile_ceilings() {
        let good = GfxPercentiles {
            p50_ms: 8.0,
            p90_ms: 16.0,
            p95_ms: 32.0,
            p99_ms: 500.0, // p99 is not gated
        };
        assert!(good.within_ceilings(P50_P90_CEILING_MS, P95_CEILING_MS));

        let slow_p90 = GfxPercentiles {
            p50_ms: 8.0,
            p90_ms: 150.0,
            p95_ms: 160.0,
            p99_ms: 170.0,
        };
        assert!(!slow_p90.within_ceilings(P50_P90_CEILING_MS, P95_CEILING_MS));

        let slow_p95 = GfxPercentiles {
            p50_ms: 8.0,
            p90_ms: 16.0,
            p95_ms: 250.0,
            p99_ms: 260.0,
        };
        assert!(!slow_p95.within_ceilings(P50_P90_CEILING_MS, P95_CEILING_MS));
    }
}
