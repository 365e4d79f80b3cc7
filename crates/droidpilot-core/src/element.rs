//! UI element tree types
//!
//! One [`UiElement`] node per accessibility node in the dumped hierarchy.
//! Both the pull path (uiautomator XML) and the push path (companion
//! service JSON) produce this shape.

use serde::{Deserialize, Serialize};

/// Device-pixel rectangle. Normalized so `right >= left` and
/// `bottom >= top`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    /// Build bounds from possibly-swapped corners.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left: left.min(right),
            top: top.min(bottom),
            right: left.max(right),
            bottom: top.max(bottom),
        }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top) as u32
    }

    /// Center point, used as the tap target for element-directed gestures.
    pub fn center(&self) -> (i32, i32) {
        (
            self.left + (self.right - self.left) / 2,
            self.top + (self.bottom - self.top) / 2,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Zero-area bounds mark elements that are present in the tree but not
    /// laid out on screen.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Numeric range info for sliders, progress bars and the like.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeInfo {
    pub min: f64,
    pub max: f64,
    pub current: f64,
}

/// A node in the observed view hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiElement {
    /// Visible text content.
    #[serde(default)]
    pub text: Option<String>,

    /// Accessible name (content description).
    #[serde(default)]
    pub accessible_name: Option<String>,

    /// Widget class (e.g. "android.widget.Button").
    #[serde(default)]
    pub class: Option<String>,

    /// Resource or testing id.
    #[serde(default)]
    pub resource_id: Option<String>,

    /// Screen rectangle, absent for nodes the source did not lay out.
    #[serde(default)]
    pub bounds: Option<Bounds>,

    #[serde(default)]
    pub clickable: bool,
    #[serde(default)]
    pub long_clickable: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub focusable: bool,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub scrollable: bool,

    /// Semantic role, when the source reports one beyond the class.
    #[serde(default)]
    pub role: Option<String>,

    /// State description (e.g. "checked", "expanded").
    #[serde(default)]
    pub state_description: Option<String>,

    /// Input hint text.
    #[serde(default)]
    pub hint: Option<String>,

    /// Validation error text attached to the element.
    #[serde(default)]
    pub error_text: Option<String>,

    /// Accessibility actions the element advertises.
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default)]
    pub range_info: Option<RangeInfo>,

    /// Ordered child elements.
    #[serde(default)]
    pub children: Vec<UiElement>,
}

impl UiElement {
    /// Depth-first iteration over this element and all descendants.
    pub fn iter(&self) -> impl Iterator<Item = &UiElement> {
        // Explicit stack keeps this allocation-light for deep trees.
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            // Push in reverse so children come out in document order.
            for child in node.children.iter().rev() {
                stack.push(child);
            }
            Some(node)
        })
    }

    /// First element (depth-first) matching the predicate.
    pub fn find(&self, pred: &dyn Fn(&UiElement) -> bool) -> Option<&UiElement> {
        self.iter().find(|e| pred(e))
    }

    /// All elements matching the predicate, in document order.
    pub fn find_all(&self, pred: &dyn Fn(&UiElement) -> bool) -> Vec<&UiElement> {
        self.iter().filter(|e| pred(e)).collect()
    }

    /// Find by exact visible text or accessible name.
    pub fn find_by_text(&self, needle: &str) -> Option<&UiElement> {
        self.find(&|e| {
            e.text.as_deref() == Some(needle) || e.accessible_name.as_deref() == Some(needle)
        })
    }

    /// Find by resource/testing id. Accepts either the fully qualified id
    /// ("com.app:id/login") or the short name ("login").
    pub fn find_by_id(&self, id: &str) -> Option<&UiElement> {
        self.find(&|e| match e.resource_id.as_deref() {
            Some(rid) => rid == id || rid.rsplit('/').next() == Some(id),
            None => false,
        })
    }

    /// The deepest element whose bounds contain the point and which accepts
    /// interaction (clickable/long-clickable/scrollable). Elements without
    /// bounds are transparent: their children are still searched, but they
    /// never count as a hit themselves.
    pub fn hit_test(&self, x: i32, y: i32) -> Option<&UiElement> {
        if let Some(bounds) = self.bounds {
            if !bounds.contains(x, y) {
                return None;
            }
        }
        for child in &self.children {
            if let Some(hit) = child.hit_test(x, y) {
                return Some(hit);
            }
        }
        if self.bounds.is_some() && self.is_interactive() {
            Some(self)
        } else {
            None
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.enabled && (self.clickable || self.long_clickable || self.scrollable)
    }

    /// Total node count including this element.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}
