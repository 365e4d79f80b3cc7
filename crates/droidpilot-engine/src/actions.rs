//! Decoding plan steps into executable actions.

use serde_json::{Map, Value};

use droidpilot_bridge::KeyCode;
use droidpilot_core::observation::Rotation;
use droidpilot_core::plan::Step;
use droidpilot_core::prelude::*;

/// Default swipe duration when a step does not give one.
pub const DEFAULT_SWIPE_MS: u64 = 300;

/// Where a tap or long press should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Absolute screen coordinates.
    Point { x: i32, y: i32 },
    /// The center of the first element whose text or accessible name
    /// matches.
    Text(String),
    /// The center of the first element with this resource id.
    Id(String),
}

/// A fully decoded plan step.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Tap(Target),
    LongPress(Target),
    Swipe {
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    },
    TypeText(String),
    PressKey(KeyCode),
    LaunchApp {
        app_id: String,
        activity: Option<String>,
    },
    StopApp {
        app_id: String,
    },
    Rotate(Rotation),
    Wait {
        ms: u64,
    },
}

impl Action {
    /// Decode a plan step. An unknown tool or missing parameter is a
    /// non-retryable plan defect.
    pub fn from_step(step: &Step) -> Result<Self> {
        let params = &step.params;
        let action = match step.tool.as_str() {
            "tap" => Action::Tap(target_from(params, &step.tool)?),
            "long_press" => Action::LongPress(target_from(params, &step.tool)?),
            "swipe" => Action::Swipe {
                x1: coord(params, "x1", &step.tool)?,
                y1: coord(params, "y1", &step.tool)?,
                x2: coord(params, "x2", &step.tool)?,
                y2: coord(params, "y2", &step.tool)?,
                duration_ms: params
                    .get("durationMs")
                    .and_then(Value::as_u64)
                    .unwrap_or(DEFAULT_SWIPE_MS),
            },
            "type_text" => Action::TypeText(required_str(params, "text", &step.tool)?),
            "press_key" => {
                let name = required_str(params, "key", &step.tool)?;
                let key = KeyCode::parse(&name).ok_or_else(|| {
                    invalid(format!("press_key: unknown key {name:?}"))
                })?;
                Action::PressKey(key)
            }
            "launch_app" => Action::LaunchApp {
                app_id: required_str(params, "appId", &step.tool)?,
                activity: params
                    .get("activity")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            "stop_app" => Action::StopApp {
                app_id: required_str(params, "appId", &step.tool)?,
            },
            "rotate" => {
                let degrees = params
                    .get("degrees")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| invalid("rotate: missing degrees"))?;
                let rotation = Rotation::from_degrees(degrees as u16)
                    .ok_or_else(|| invalid(format!("rotate: bad degrees {degrees}")))?;
                Action::Rotate(rotation)
            }
            "wait" => Action::Wait {
                ms: params
                    .get("ms")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| invalid("wait: missing ms"))?,
            },
            other => return Err(invalid(format!("unknown tool {other:?}"))),
        };
        Ok(action)
    }

    /// Whether running the action should leave the screen visibly
    /// different, which the interaction loop asserts after the fact.
    pub fn expects_change(&self) -> bool {
        !matches!(self, Action::Wait { .. })
    }

    /// Whether the next observation should use the strict pixel match,
    /// so a single typed character cannot hide inside cache tolerance.
    pub fn strict_pixels(&self) -> bool {
        matches!(self, Action::TypeText(_))
    }
}

fn target_from(params: &Map<String, Value>, tool: &str) -> Result<Target> {
    if let (Some(x), Some(y)) = (
        params.get("x").and_then(Value::as_i64),
        params.get("y").and_then(Value::as_i64),
    ) {
        return Ok(Target::Point {
            x: x as i32,
            y: y as i32,
        });
    }
    if let Some(text) = params.get("text").and_then(Value::as_str) {
        return Ok(Target::Text(text.to_string()));
    }
    if let Some(id) = params.get("id").and_then(Value::as_str) {
        return Ok(Target::Id(id.to_string()));
    }
    Err(invalid(format!("{tool}: needs x/y, text, or id")))
}

fn coord(params: &Map<String, Value>, key: &str, tool: &str) -> Result<i32> {
    params
        .get(key)
        .and_then(Value::as_i64)
        .map(|v| v as i32)
        .ok_or_else(|| invalid(format!("{tool}: missing {key}")))
}

fn required_str(params: &Map<String, Value>, key: &str, tool: &str) -> Result<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(format!("{tool}: missing {key}")))
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigInvalid {
        message: message.into(),
    }
}
