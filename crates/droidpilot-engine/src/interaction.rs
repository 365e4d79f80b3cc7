//! The observe-act-observe interaction loop.
//!
//! One round takes an initial observation, runs a batch of steps with
//! stability waits between them, takes a final observation, and asserts
//! that the screen actually changed when the actions said it should.
//! A round always produces at least the initial observation, whatever
//! else fails.

use tokio::time::{sleep, Duration};

use droidpilot_bridge::DeviceBridge;
use droidpilot_core::element::UiElement;
use droidpilot_core::observation::Observation;
use droidpilot_core::plan::{ActionResult, Step};
use droidpilot_core::prelude::*;

use crate::actions::{Action, Target};
use crate::cache::HierarchyCache;
use crate::config::EngineConfig;
use crate::observe::{observe, ObserveOptions};
use crate::stability::{wait_rotation, wait_touch_idle, wait_ui_stability};

/// Loop phases, advanced by [`InteractionLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    InitialObserve,
    Execute(usize),
    FinalObserve,
    Done,
}

/// Result of one interaction round.
#[derive(Debug)]
pub struct RoundResult {
    /// One record per step attempted, in order. Steps after a failure
    /// are not attempted and get no record.
    pub results: Vec<ActionResult>,
    /// The error that ended the round, absent on success.
    pub error: Option<Error>,
}

impl RoundResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives observe-act-observe rounds against one device.
pub struct InteractionLoop<'a, B: DeviceBridge> {
    bridge: &'a B,
    serial: &'a str,
    cache: &'a mut HierarchyCache,
    config: &'a EngineConfig,
    /// Seed for the next round's initial observation.
    last_observation: Option<Observation>,
}

impl<'a, B: DeviceBridge> InteractionLoop<'a, B> {
    pub fn new(
        bridge: &'a B,
        serial: &'a str,
        cache: &'a mut HierarchyCache,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            bridge,
            serial,
            cache,
            config,
            last_observation: None,
        }
    }

    /// Carry an observation from a previous round as the seed.
    pub fn with_seed(mut self, seed: Option<Observation>) -> Self {
        self.last_observation = seed;
        self
    }

    pub fn last_observation(&self) -> Option<&Observation> {
        self.last_observation.as_ref()
    }

    /// Run one round over `steps`. Result indices start at `base_index`
    /// so records line up with positions in the surrounding plan.
    pub async fn run(&mut self, steps: &[Step], base_index: usize) -> RoundResult {
        let mut results = Vec::with_capacity(steps.len());
        let mut error = None;

        let mut phase = Phase::InitialObserve;
        let initial = observe(
            self.bridge,
            self.serial,
            self.cache,
            self.last_observation.as_ref(),
            ObserveOptions::default(),
        )
        .await;
        let mut current = initial.clone();
        let mut any_change_expected = false;

        while phase != Phase::Done {
            phase = match phase {
                Phase::InitialObserve => {
                    if steps.is_empty() {
                        Phase::FinalObserve
                    } else {
                        Phase::Execute(0)
                    }
                }
                Phase::Execute(i) => {
                    let step = &steps[i];
                    let index = base_index + i;
                    let before = current.clone();
                    match self.run_step(step, &before).await {
                        Ok(action) => {
                            any_change_expected |= action.expects_change();
                            let after =
                                self.settle_and_observe(&before, action.strict_pixels()).await;
                            current = after.clone();
                            results.push(ActionResult {
                                index,
                                success: true,
                                before: Some(before),
                                after: Some(after),
                                error: None,
                            });
                            if i + 1 < steps.len() {
                                Phase::Execute(i + 1)
                            } else {
                                Phase::FinalObserve
                            }
                        }
                        Err(e) => {
                            warn!(
                                step = step.display_name(),
                                index,
                                error = %e,
                                "step failed, ending round"
                            );
                            // Best-effort view of where the device ended
                            // up; the change assertion is skipped since
                            // the batch never completed.
                            let after = observe(
                                self.bridge,
                                self.serial,
                                self.cache,
                                Some(&before),
                                ObserveOptions::default(),
                            )
                            .await;
                            current = after.clone();
                            results.push(ActionResult {
                                index,
                                success: false,
                                before: Some(before),
                                after: Some(after),
                                error: Some(e.to_string()),
                            });
                            error = Some(e);
                            Phase::Done
                        }
                    }
                }
                Phase::FinalObserve => {
                    // `current` already holds the post-action snapshot;
                    // the round-level check compares it to the start.
                    if any_change_expected && screens_match(&initial, &current) {
                        let e = Error::actionable(
                            "actions completed but the screen did not change",
                            initial.clone(),
                            current.clone(),
                        );
                        if let Some(last) = results.last_mut() {
                            last.success = false;
                            last.error = Some(e.to_string());
                        }
                        error = Some(e);
                    }
                    Phase::Done
                }
                Phase::Done => Phase::Done,
            };
        }

        self.last_observation = Some(current);
        RoundResult { results, error }
    }

    /// Decode and execute one step against the current observation.
    async fn run_step(&mut self, step: &Step, before: &Observation) -> Result<Action> {
        let action = Action::from_step(step)?;
        self.wait_for_touch_idle().await;

        match &action {
            Action::Tap(target) => {
                let (x, y) = resolve_target(target, before)?;
                self.bridge.tap(self.serial, x, y).await?;
            }
            Action::LongPress(target) => {
                let (x, y) = resolve_target(target, before)?;
                self.bridge.long_press(self.serial, x, y).await?;
            }
            Action::Swipe {
                x1,
                y1,
                x2,
                y2,
                duration_ms,
            } => {
                self.bridge
                    .swipe(self.serial, *x1, *y1, *x2, *y2, *duration_ms)
                    .await?;
            }
            Action::TypeText(text) => self.bridge.type_text(self.serial, text).await?,
            Action::PressKey(key) => self.bridge.press_key(self.serial, *key).await?,
            Action::LaunchApp { app_id, activity } => {
                self.bridge
                    .launch_app(self.serial, app_id, activity.as_deref())
                    .await?;
            }
            Action::StopApp { app_id } => self.bridge.stop_app(self.serial, app_id).await?,
            Action::Rotate(rotation) => {
                self.bridge.set_rotation(self.serial, *rotation).await?;
                wait_rotation(self.bridge, self.serial, *rotation, &self.config.stability)
                    .await?;
            }
            Action::Wait { ms } => sleep(Duration::from_millis(*ms)).await,
        }
        Ok(action)
    }

    async fn wait_for_touch_idle(&self) {
        match self.bridge.watch_touch_events(self.serial) {
            Ok(mut stream) => {
                wait_touch_idle(&mut stream, &self.config.stability).await;
            }
            Err(e) => debug!(error = %e, "no touch stream, skipping idle wait"),
        }
    }

    /// Wait for the UI to settle, then snapshot it.
    async fn settle_and_observe(&mut self, before: &Observation, strict: bool) -> Observation {
        if let Some(window) = &before.active_window {
            if let Err(e) = wait_ui_stability(
                self.bridge,
                self.serial,
                &window.app_id,
                &self.config.stability,
            )
            .await
            {
                debug!(error = %e, "stability wait failed, observing anyway");
            }
        }
        let options = if strict {
            ObserveOptions::strict()
        } else {
            ObserveOptions::default()
        };
        observe(self.bridge, self.serial, self.cache, Some(before), options).await
    }
}

/// Resolve a tap target to screen coordinates against an observation.
fn resolve_target(target: &Target, obs: &Observation) -> Result<(i32, i32)> {
    match target {
        Target::Point { x, y } => Ok((*x, *y)),
        Target::Text(text) => element_center(
            obs.view_hierarchy.as_ref().and_then(|t| t.find_by_text(text)),
            obs,
            &format!("text {text:?}"),
        ),
        Target::Id(id) => element_center(
            obs.view_hierarchy.as_ref().and_then(|t| t.find_by_id(id)),
            obs,
            &format!("id {id:?}"),
        ),
    }
}

fn element_center(
    element: Option<&UiElement>,
    obs: &Observation,
    what: &str,
) -> Result<(i32, i32)> {
    let element = element.ok_or_else(|| {
        Error::actionable(
            format!("no element matching {what}"),
            obs.clone(),
            obs.clone(),
        )
    })?;
    let bounds = element.bounds.ok_or_else(|| {
        Error::actionable(
            format!("element matching {what} has no bounds"),
            obs.clone(),
            obs.clone(),
        )
    })?;
    Ok(bounds.center())
}

/// Whether two observations show the same screen. Sameness requires
/// matching screenshot hashes, hierarchies, rotation, and focused window;
/// missing pixel data on either side counts as a change, never sameness.
fn screens_match(a: &Observation, b: &Observation) -> bool {
    let hashes_match = match (&a.screenshot_hash, &b.screenshot_hash) {
        (Some(ha), Some(hb)) => ha == hb,
        _ => false,
    };
    let trees_match = match (&a.view_hierarchy, &b.view_hierarchy) {
        (Some(ta), Some(tb)) => ta == tb,
        (None, None) => true,
        _ => false,
    };
    hashes_match && trees_match && a.rotation == b.rotation && a.active_window == b.active_window
}
