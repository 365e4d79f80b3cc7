//! Parser for `getevent -lt` touch event lines.

use std::sync::LazyLock;

use regex::Regex;

static EVENT_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // [   12345.678901] /dev/input/event2: EV_ABS  ABS_MT_POSITION_X  0000021c
    Regex::new(r"^\[\s*(\d+\.\d+)\]\s+(\S+):\s+(\S+)\s+(\S+)\s+(\S+)").unwrap()
});

/// What a touch-related input line reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchEventKind {
    /// BTN_TOUCH DOWN or a new tracking id.
    Down,
    /// BTN_TOUCH UP or a cleared tracking id.
    Up,
    /// Position or pressure update within a gesture.
    Move,
}

/// A single touch event from the getevent stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    /// Kernel timestamp in seconds (CLOCK_MONOTONIC).
    pub timestamp_secs: f64,
    pub kind: TouchEventKind,
}

/// Parse one `getevent -lt` line into a touch event.
///
/// Returns `None` for non-touch lines (key events, sync reports, device
/// banners printed when the stream opens).
pub fn parse_event_line(line: &str) -> Option<TouchEvent> {
    let caps = EVENT_LINE_RE.captures(line)?;
    let timestamp_secs: f64 = caps[1].parse().ok()?;
    let event_type = &caps[3];
    let code = &caps[4];
    let value = &caps[5];

    let kind = match (event_type, code) {
        ("EV_KEY", "BTN_TOUCH") => match value {
            "DOWN" => TouchEventKind::Down,
            "UP" => TouchEventKind::Up,
            _ => return None,
        },
        ("EV_ABS", "ABS_MT_TRACKING_ID") => {
            // ffffffff marks the slot being released.
            if value.eq_ignore_ascii_case("ffffffff") {
                TouchEventKind::Up
            } else {
                TouchEventKind::Down
            }
        }
        ("EV_ABS", code) if code.starts_with("ABS_MT_") || code.starts_with("ABS_") => {
            TouchEventKind::Move
        }
        _ => return None,
    };

    Some(TouchEvent {
        timestamp_secs,
        kind,
    })
}
