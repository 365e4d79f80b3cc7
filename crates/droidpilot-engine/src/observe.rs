//! Single-snapshot observation of a device screen.
//!
//! An observation never fails as a whole. Every probe that errors is
//! absorbed into [`Observation::error`] and the rest of the snapshot is
//! still taken; callers get the best picture the device allowed.

use chrono::Utc;

use droidpilot_bridge::DeviceBridge;
use droidpilot_core::observation::Observation;
use droidpilot_core::prelude::*;

use crate::cache::{self, HierarchyCache};

/// Knobs for a single [`observe`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserveOptions {
    /// Tighten the cache's pixel compare, used right after text entry
    /// where a one-character difference must not be mistaken for the
    /// same screen.
    pub strict_pixels: bool,
    /// Geometry and window only; screenshot and hierarchy resolution
    /// are skipped. For cheap polls between actions.
    pub skip_hierarchy: bool,
}

impl ObserveOptions {
    pub fn strict() -> Self {
        Self {
            strict_pixels: true,
            ..Self::default()
        }
    }
}

/// Take a snapshot of the device's current UI state.
///
/// `prev` seeds slow-moving fields (geometry, active window) so they are
/// queried in full only on the first call; the fresh window dump corrects
/// the active window and rotation on every call. The frame-render
/// counters are reset alongside it, opening a new measurement epoch for
/// the next stability wait.
pub async fn observe<B: DeviceBridge>(
    bridge: &B,
    serial: &str,
    cache: &mut HierarchyCache,
    prev: Option<&Observation>,
    options: ObserveOptions,
) -> Observation {
    let mut obs = match prev {
        Some(prev) => Observation::seeded_from(prev),
        None => Observation::empty(),
    };

    let reset_app = prev.and_then(|p| p.active_window.as_ref());
    let (window, geometry, reset) = tokio::join!(
        bridge.window_state(serial),
        async {
            match prev {
                None => Some(bridge.display_geometry(serial).await),
                Some(_) => None,
            }
        },
        async {
            match reset_app {
                Some(window) => Some(bridge.reset_gfx_stats(serial, &window.app_id).await),
                None => None,
            }
        },
    );
    match window {
        Ok(window) => {
            obs.active_window = window.focused;
            obs.intent_chooser_detected = window.intent_chooser;
            if let Some(rotation) = window.rotation {
                obs.rotation = rotation;
            }
        }
        Err(e) => obs.push_error(format!("window state: {e}")),
    }
    match geometry {
        Some(Ok(geometry)) => {
            obs.screen_size = geometry.size;
            obs.system_insets = geometry.insets;
            obs.rotation = geometry.rotation;
        }
        Some(Err(e)) => obs.push_error(format!("display geometry: {e}")),
        None => {}
    }
    if let Some(Err(e)) = reset {
        obs.push_error(format!("gfx counter reset: {e}"));
    }

    if options.skip_hierarchy {
        obs.timestamp = Utc::now();
        if let Some(error) = &obs.error {
            warn!(serial, %error, "observation degraded");
        }
        return obs;
    }

    let screenshot = match bridge.screenshot(serial).await {
        Ok(png) => Some(png),
        Err(e) => {
            obs.push_error(format!("screenshot: {e}"));
            None
        }
    };
    if let Some(png) = &screenshot {
        match cache::screenshot_hash(png) {
            Ok(hash) => obs.screenshot_hash = Some(hash),
            Err(e) => obs.push_error(format!("screenshot hash: {e}")),
        }
    }

    let companion = match bridge.companion_running(serial).await {
        Ok(running) => running,
        Err(e) => {
            debug!(error = %e, "companion probe failed, using pull path");
            false
        }
    };

    if companion {
        // Push path: the companion maintains its own snapshot, so the
        // cache is neither consulted nor populated.
        match bridge.companion_hierarchy(serial).await {
            Ok(tree) => obs.view_hierarchy = tree,
            Err(e) => obs.push_error(format!("companion snapshot: {e}")),
        }
    } else {
        let cached = screenshot.as_deref().and_then(|png| {
            let (outcome, tree) = cache.lookup(png, options.strict_pixels);
            debug!(?outcome, "hierarchy cache lookup");
            tree
        });
        match cached {
            Some(tree) => obs.view_hierarchy = Some(tree),
            None => match bridge.dump_hierarchy(serial).await {
                Ok(Some(tree)) => {
                    if let Some(png) = &screenshot {
                        cache.insert(png, &tree);
                    }
                    obs.view_hierarchy = Some(tree);
                }
                // Secure surface or mid-transition dump. Not an error,
                // and deliberately not cached.
                Ok(None) => {}
                Err(e) => obs.push_error(format!("hierarchy dump: {e}")),
            },
        }
    }

    let focused = obs.find_focused().cloned();
    obs.focused_element = focused;
    obs.timestamp = Utc::now();

    if let Some(error) = &obs.error {
        warn!(serial, %error, "observation degraded");
    }
    obs
}
