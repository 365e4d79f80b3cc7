//! Parsers for `dumpsys window`, `wm size`, and rotation state.

use std::sync::LazyLock;

use regex::Regex;

use droidpilot_core::observation::{ActiveWindow, Insets, Rotation, ScreenSize};

static CURRENT_FOCUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    // mCurrentFocus=Window{8a3c1f2 u0 com.example.app/com.example.app.MainActivity}
    Regex::new(r"mCurrentFocus=Window\{\S+ u\d+ ([^\s}]+)\}").unwrap()
});

static FOCUSED_APP_RE: LazyLock<Regex> = LazyLock::new(|| {
    // mFocusedApp=ActivityRecord{1f0a2b3 u0 com.example.app/.MainActivity t42}
    Regex::new(r"mFocusedApp=ActivityRecord\{\S+ u\d+ ([^\s}]+)(?: t\d+)?\}").unwrap()
});

static PHYSICAL_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Physical size: 1080x2400
    Regex::new(r"Physical size:\s*(\d+)x(\d+)").unwrap()
});

static OVERRIDE_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Override size: 720x1600
    Regex::new(r"Override size:\s*(\d+)x(\d+)").unwrap()
});

static CURRENT_ROTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    // mCurrentRotation=ROTATION_90
    Regex::new(r"mCurrentRotation=ROTATION_(\d+)").unwrap()
});

static SURFACE_ORIENTATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    // SurfaceOrientation: 1
    Regex::new(r"SurfaceOrientation:\s*(\d)").unwrap()
});

static INSETS_SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // InsetsSource type=statusBars frame=[0,0][1080,80]
    // InsetsSource ITYPE_NAVIGATION_BAR frame=[0,2268][1080,2400]
    Regex::new(
        r"InsetsSource\s+(?:type=)?(\w+).*?frame=\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]",
    )
    .unwrap()
});

static PHYSICAL_DENSITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Physical density: 420
    Regex::new(r"Physical density:\s*(\d+)").unwrap()
});

/// Window names that indicate a share sheet / app chooser is on screen.
const CHOOSER_MARKERS: &[&str] = &["ChooserActivity", "ResolverActivity"];

/// Extract the focused window from `dumpsys window windows` output.
///
/// Falls back to `mFocusedApp` when `mCurrentFocus` is absent or names a
/// system surface (input method, notification shade) without an activity.
pub fn parse_focused_window(output: &str) -> Option<ActiveWindow> {
    if let Some(caps) = CURRENT_FOCUS_RE.captures(output) {
        if let Some(window) = split_component(&caps[1]) {
            return Some(window);
        }
    }
    FOCUSED_APP_RE
        .captures(output)
        .and_then(|caps| split_component(&caps[1]))
}

/// Whether the focused window is an intent chooser / resolver sheet.
pub fn detect_intent_chooser(output: &str) -> bool {
    let focus_line = output
        .lines()
        .find(|line| line.contains("mCurrentFocus="))
        .unwrap_or("");
    CHOOSER_MARKERS.iter().any(|m| focus_line.contains(m))
}

/// Split "com.example.app/com.example.app.MainActivity" into app id and a
/// fully qualified activity name. Relative activities (".MainActivity") are
/// qualified against the app id.
fn split_component(component: &str) -> Option<ActiveWindow> {
    let component = component.trim();
    if component.is_empty() {
        return None;
    }
    match component.split_once('/') {
        Some((app_id, activity)) => {
            let activity = if let Some(rest) = activity.strip_prefix('.') {
                format!("{app_id}.{rest}")
            } else {
                activity.to_string()
            };
            Some(ActiveWindow {
                app_id: app_id.to_string(),
                activity: Some(activity),
            })
        }
        // Bare window names like "StatusBar" are system surfaces, not apps.
        None if component.contains('.') => Some(ActiveWindow {
            app_id: component.to_string(),
            activity: None,
        }),
        None => None,
    }
}

/// Parse `wm size` output. Prefers the override size when one is set.
pub fn parse_screen_size(output: &str) -> Option<ScreenSize> {
    let caps = OVERRIDE_SIZE_RE
        .captures(output)
        .or_else(|| PHYSICAL_SIZE_RE.captures(output))?;
    Some(ScreenSize {
        width: caps[1].parse().ok()?,
        height: caps[2].parse().ok()?,
    })
}

/// Parse `wm density` output.
pub fn parse_density(output: &str) -> Option<u32> {
    PHYSICAL_DENSITY_RE
        .captures(output)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse the display rotation from `dumpsys window` or `dumpsys input`.
pub fn parse_rotation(output: &str) -> Option<Rotation> {
    if let Some(caps) = CURRENT_ROTATION_RE.captures(output) {
        let degrees: u16 = caps[1].parse().ok()?;
        return Rotation::from_degrees(degrees);
    }
    SURFACE_ORIENTATION_RE
        .captures(output)
        .and_then(|caps| caps[1].parse::<u8>().ok())
        .and_then(Rotation::from_surface_index)
}

/// Extract status and navigation bar insets from `dumpsys window` output.
///
/// Frames are absolute display rects. Bars anchored to a display edge
/// contribute their thickness to that edge; unknown source types are
/// ignored.
pub fn parse_system_insets(output: &str, screen: ScreenSize) -> Insets {
    let mut insets = Insets::default();
    for caps in INSETS_SOURCE_RE.captures_iter(output) {
        let source = &caps[1];
        let is_bar = source.contains("statusBars")
            || source.contains("navigationBars")
            || source.contains("STATUS_BAR")
            || source.contains("NAVIGATION_BAR");
        if !is_bar {
            continue;
        }
        let (Ok(left), Ok(top), Ok(right), Ok(bottom)) = (
            caps[2].parse::<i64>(),
            caps[3].parse::<i64>(),
            caps[4].parse::<i64>(),
            caps[5].parse::<i64>(),
        ) else {
            continue;
        };
        if right <= left || bottom <= top {
            continue;
        }
        let width = (right - left) as u32;
        let height = (bottom - top) as u32;
        // Wide shallow rects hug the top or bottom edge; tall narrow ones
        // hug the left or right edge.
        if width >= height {
            if top == 0 {
                insets.top = insets.top.max(height);
            } else if bottom as u32 >= screen.height {
                insets.bottom = insets.bottom.max(height);
            }
        } else if left == 0 {
            insets.left = insets.left.max(width);
        } else if right as u32 >= screen.width {
            insets.right = insets.right.max(width);
        }
    }
    insets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_focused_window_current_focus() {
        let output = "  mCurrentFocus=Window{8a3c1f2 u0 com.example.app/com.example.app.MainActivity}";
        let window = parse_focused_window(output).unwrap();
        assert_eq!(window.app_id, "com.example.app");
        assert_eq!(
            window.activity.as_deref(),
            Some("com.example.app.MainActivity")
        );
    }

    #[test]
    fn test_parse_focused_window_relative_activity() {
        let output = "mFocusedApp=ActivityRecord{1f0a2b3 u0 com.example.app/.MainActivity t42}";
        let window = parse_focused_window(output).unwrap();
        assert_eq!(window.app_id, "com.example.app");
        assert_eq!(
            window.activity.as_deref(),
            Some("com.example.app.MainActivity")
        );
    }

    #[test]
    fn test_parse_focused_window_falls_back_to_focused_app() {
        let output = "\
  mCurrentFocus=Window{2b1 u0 StatusBar}
  mFocusedApp=ActivityRecord{1f0 u0 com.android.settings/.Settings t7}
";
        let window = parse_focused_window(output).unwrap();
        assert_eq!(window.app_id, "com.android.settings");
    }

    #[test]
    fn test_parse_focused_window_none() {
        assert!(parse_focused_window("no focus here").is_none());
    }

    #[test]
    fn test_detect_intent_chooser() {
        let chooser = "mCurrentFocus=Window{1a u0 android/com.android.internal.app.ChooserActivity}";
        assert!(detect_intent_chooser(chooser));

        let resolver = "mCurrentFocus=Window{1a u0 android/com.android.internal.app.ResolverActivity}";
        assert!(detect_intent_chooser(resolver));

        let normal = "mCurrentFocus=Window{1a u0 com.example.app/.MainActivity}";
        assert!(!detect_intent_chooser(normal));
    }

    #[test]
    fn test_parse_screen_size() {
        let size = parse_screen_size("Physical size: 1080x2400\n").unwrap();
        assert_eq!(size.width, 1080);
        assert_eq!(size.height, 2400);
    }

    #[test]
    fn test_parse_screen_size_override_wins() {
        let output = "Physical size: 1080x2400\nOverride size: 720x1600\n";
        let size = parse_screen_size(output).unwrap();
        assert_eq!(size.width, 720);
        assert_eq!(size.height, 1600);
    }

    #[test]
    fn test_parse_density() {
        assert_eq!(parse_density("Physical density: 420\n"), Some(420));
        assert_eq!(parse_density(""), None);
    }

    #[test]
    fn test_parse_rotation() {
        assert_eq!(
            parse_rotation("  mCurrentRotation=ROTATION_90"),
            Some(Rotation::Deg90)
        );
        assert_eq!(
            parse_rotation("    SurfaceOrientation: 3"),
            Some(Rotation::Deg270)
        );
        assert_eq!(parse_rotation("nothing"), None);
    }

    #[test]
    fn test_parse_system_insets() {
        let output = "\
    InsetsSource type=statusBars frame=[0,0][1080,80]
    InsetsSource type=navigationBars frame=[0,2268][1080,2400]
    InsetsSource type=ime frame=[0,1400][1080,2400]
";
        let screen = ScreenSize {
            width: 1080,
            height: 2400,
        };
        let insets = parse_system_insets(output, screen);
        assert_eq!(insets.top, 80);
        assert_eq!(insets.bottom, 132);
        assert_eq!(insets.left, 0);
        assert_eq!(insets.right, 0);
    }

    #[test]
    fn test_parse_system_insets_legacy_types() {
        let output = "\
    InsetsSource ITYPE_STATUS_BAR frame=[0,0][2400,63]
    InsetsSource ITYPE_NAVIGATION_BAR frame=[2274,0][2400,1080]
";
        let screen = ScreenSize {
            width: 2400,
            height: 1080,
        };
        let insets = parse_system_insets(output, screen);
        assert_eq!(insets.top, 63);
        assert_eq!(insets.right, 126);
    }
}
