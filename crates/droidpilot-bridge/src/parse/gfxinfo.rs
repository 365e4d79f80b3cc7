//! Parser for `dumpsys gfxinfo <package>` frame statistics.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use droidpilot_core::gfx::{GfxCounters, GfxPercentiles, GfxStats};

static TOTAL_FRAMES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Total frames rendered:\s*(\d+)").unwrap());

static MISSED_VSYNC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Number Missed Vsync:\s*(\d+)").unwrap());

static SLOW_UI_THREAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Number Slow UI thread:\s*(\d+)").unwrap());

static FRAME_DEADLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Number Frame deadline missed:\s*(\d+)").unwrap());

static PERCENTILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)th percentile:\s*(\d+(?:\.\d+)?)ms").unwrap());

/// Parse a `dumpsys gfxinfo` dump into frame statistics.
///
/// Missing fields default to zero rather than failing. A freshly reset
/// stats buffer legitimately reports no percentile lines at all.
pub fn parse_gfxinfo(output: &str) -> GfxStats {
    let counters = GfxCounters {
        missed_vsync: capture_u64(&MISSED_VSYNC_RE, output),
        slow_ui_thread: capture_u64(&SLOW_UI_THREAD_RE, output),
        frame_deadline_missed: capture_u64(&FRAME_DEADLINE_RE, output),
    };

    let mut percentiles = GfxPercentiles::default();
    for caps in PERCENTILE_RE.captures_iter(output) {
        let Ok(millis) = caps[2].parse::<f64>() else {
            continue;
        };
        match &caps[1] {
            "50" => percentiles.p50_ms = millis,
            "90" => percentiles.p90_ms = millis,
            "95" => percentiles.p95_ms = millis,
            "99" => percentiles.p99_ms = millis,
            _ => {}
        }
    }

    GfxStats {
        counters,
        percentiles,
        total_frames: capture_u64(&TOTAL_FRAMES_RE, output),
        timestamp: Utc::now(),
    }
}

fn capture_u64(re: &Regex, output: &str) -> u64 {
    re.captures(output)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}
