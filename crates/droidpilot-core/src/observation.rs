//! Point-in-time device UI snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::UiElement;

/// Physical screen size in device pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// System bar insets in device pixels (status bar, navigation bar, cutouts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Insets {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

/// Display rotation, clockwise from the device's natural orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Rotation in degrees (0/90/180/270).
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Parse a degree value. Only the four cardinal rotations are valid.
    pub fn from_degrees(deg: u16) -> Option<Self> {
        match deg {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Parse a surface orientation index as reported by `dumpsys window`
    /// (0..=3, quarter turns clockwise).
    pub fn from_surface_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Rotation::Deg0),
            1 => Some(Rotation::Deg90),
            2 => Some(Rotation::Deg180),
            3 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    /// Whether the display is in a landscape orientation.
    pub fn is_landscape(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// The currently focused window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveWindow {
    /// Application/package id (e.g. "com.android.settings").
    pub app_id: String,
    /// Activity or scene name within the app, if the window reports one.
    #[serde(default)]
    pub activity: Option<String>,
}

impl ActiveWindow {
    pub fn new(app_id: impl Into<String>, activity: Option<String>) -> Self {
        Self {
            app_id: app_id.into(),
            activity,
        }
    }
}

/// A point-in-time snapshot of device UI state.
///
/// Observations are always returned, never thrown: sub-query failures are
/// appended to [`Observation::error`] and every other field is populated
/// from whatever succeeded.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// When the snapshot was assembled.
    pub timestamp: DateTime<Utc>,

    pub screen_size: ScreenSize,

    pub system_insets: Insets,

    pub rotation: Rotation,

    /// Focused app/activity, if a window dump succeeded (now or previously).
    #[serde(default)]
    pub active_window: Option<ActiveWindow>,

    /// Full UI element tree, if hierarchy resolution succeeded.
    #[serde(default)]
    pub view_hierarchy: Option<UiElement>,

    /// The focused element within the hierarchy, if any.
    #[serde(default)]
    pub focused_element: Option<UiElement>,

    /// Whether an intent chooser / resolver dialog is in the foreground.
    #[serde(default)]
    pub intent_chooser_detected: bool,

    /// Difference hash of the screenshot this snapshot was assembled from,
    /// when the pull path captured one. Used for cheap change comparison.
    #[serde(default)]
    pub screenshot_hash: Option<String>,

    /// Accumulated sub-query failure descriptions. `Some` never implies the
    /// other fields are unusable.
    #[serde(default)]
    pub error: Option<String>,
}

impl Observation {
    /// An observation with no data yet. Callers fill in what they learn.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            screen_size: ScreenSize::default(),
            system_insets: Insets::default(),
            rotation: Rotation::default(),
            active_window: None,
            view_hierarchy: None,
            focused_element: None,
            intent_chooser_detected: false,
            screenshot_hash: None,
            error: None,
        }
    }

    /// Seed a new observation from a previous one: geometry and the last
    /// known active window carry over, volatile fields reset.
    pub fn seeded_from(prev: &Observation) -> Self {
        Self {
            timestamp: Utc::now(),
            screen_size: prev.screen_size,
            system_insets: prev.system_insets,
            rotation: prev.rotation,
            active_window: prev.active_window.clone(),
            view_hierarchy: None,
            focused_element: None,
            intent_chooser_detected: false,
            screenshot_hash: None,
            error: None,
        }
    }

    /// Append a sub-query failure description.
    pub fn push_error(&mut self, message: impl AsRef<str>) {
        match &mut self.error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(message.as_ref());
            }
            None => self.error = Some(message.as_ref().to_string()),
        }
    }

    /// Whether any sub-query failed while assembling this observation.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }

    /// Locate the focused element in the hierarchy, if one is marked.
    pub fn find_focused(&self) -> Option<&UiElement> {
        self.view_hierarchy.as_ref().and_then(|root| root.find(&|e| e.focused))
    }
}
