//! Input injection through `adb shell input` and activity control.

use droidpilot_core::observation::Rotation;
use droidpilot_core::prelude::*;

use crate::adb::Adb;

/// Hold duration for a long press, in milliseconds.
pub const LONG_PRESS_MS: u64 = 600;

/// Android key codes used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Home,
    Back,
    AppSwitch,
    Enter,
    Delete,
    Tab,
    Escape,
    DpadUp,
    DpadDown,
    VolumeUp,
    VolumeDown,
    Power,
    /// Raw code for keys not covered above.
    Raw(u16),
}

impl KeyCode {
    pub fn code(self) -> u16 {
        match self {
            KeyCode::Home => 3,
            KeyCode::Back => 4,
            KeyCode::AppSwitch => 187,
            KeyCode::Enter => 66,
            KeyCode::Delete => 67,
            KeyCode::Tab => 61,
            KeyCode::Escape => 111,
            KeyCode::DpadUp => 19,
            KeyCode::DpadDown => 20,
            KeyCode::VolumeUp => 24,
            KeyCode::VolumeDown => 25,
            KeyCode::Power => 26,
            KeyCode::Raw(code) => code,
        }
    }

    /// Parse a key name as used in plan steps.
    pub fn parse(name: &str) -> Option<Self> {
        let key = match name.to_ascii_lowercase().as_str() {
            "home" => KeyCode::Home,
            "back" => KeyCode::Back,
            "app_switch" | "recents" => KeyCode::AppSwitch,
            "enter" => KeyCode::Enter,
            "delete" | "del" => KeyCode::Delete,
            "tab" => KeyCode::Tab,
            "escape" => KeyCode::Escape,
            "dpad_up" => KeyCode::DpadUp,
            "dpad_down" => KeyCode::DpadDown,
            "volume_up" => KeyCode::VolumeUp,
            "volume_down" => KeyCode::VolumeDown,
            "power" => KeyCode::Power,
            other => return other.parse().ok().map(KeyCode::Raw),
        };
        Some(key)
    }
}

/// Injector for taps, swipes, text, and key events on one device.
pub struct Input<'a> {
    adb: &'a Adb,
    serial: &'a str,
}

impl<'a> Input<'a> {
    pub fn new(adb: &'a Adb, serial: &'a str) -> Self {
        Self { adb, serial }
    }

    pub async fn tap(&self, x: i32, y: i32) -> Result<()> {
        self.shell(&["input", "tap", &x.to_string(), &y.to_string()])
            .await
    }

    pub async fn long_press(&self, x: i32, y: i32) -> Result<()> {
        // A swipe that stays in place is how `input` expresses a hold.
        let (xs, ys) = (x.to_string(), y.to_string());
        self.shell(&[
            "input",
            "swipe",
            &xs,
            &ys,
            &xs,
            &ys,
            &LONG_PRESS_MS.to_string(),
        ])
        .await
    }

    pub async fn swipe(
        &self,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<()> {
        self.shell(&[
            "input",
            "swipe",
            &x1.to_string(),
            &y1.to_string(),
            &x2.to_string(),
            &y2.to_string(),
            &duration_ms.to_string(),
        ])
        .await
    }

    pub async fn type_text(&self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let escaped = escape_input_text(text);
        self.shell(&["input", "text", &escaped]).await
    }

    pub async fn press_key(&self, key: KeyCode) -> Result<()> {
        self.shell(&["input", "keyevent", &key.code().to_string()])
            .await
    }

    /// Pin the display to a rotation via settings.
    ///
    /// Disables the accelerometer first so the sensor cannot immediately
    /// rotate the display back.
    pub async fn set_rotation(&self, rotation: Rotation) -> Result<()> {
        self.shell(&["settings", "put", "system", "accelerometer_rotation", "0"])
            .await?;
        let index = (rotation.degrees() / 90).to_string();
        self.shell(&["settings", "put", "system", "user_rotation", &index])
            .await
    }

    /// Launch an app by package id, optionally into a specific activity.
    pub async fn launch_app(&self, app_id: &str, activity: Option<&str>) -> Result<()> {
        match activity {
            Some(activity) => {
                let component = format!("{app_id}/{activity}");
                let output = self
                    .adb
                    .shell(self.serial, &["am", "start", "-W", "-n", &component])
                    .await?;
                check_am_output(&output)
            }
            None => {
                let output = self
                    .adb
                    .shell(
                        self.serial,
                        &[
                            "monkey",
                            "-p",
                            app_id,
                            "-c",
                            "android.intent.category.LAUNCHER",
                            "1",
                        ],
                    )
                    .await?;
                if output.contains("No activities found") || output.contains("monkey aborted") {
                    Err(Error::bridge(format!("failed to launch {app_id}: {output}")))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub async fn stop_app(&self, app_id: &str) -> Result<()> {
        self.shell(&["am", "force-stop", app_id]).await
    }

    async fn shell(&self, args: &[&str]) -> Result<()> {
        self.adb.shell(self.serial, args).await.map(|_| ())
    }
}

fn check_am_output(output: &str) -> Result<()> {
    if output.contains("Error:") || output.contains("Exception") {
        Err(Error::bridge(format!("am start failed: {}", output.trim())))
    } else {
        Ok(())
    }
}

/// Escape text for `input text`.
///
/// The device-side shell splits arguments again, and `input text` itself
/// treats `%s` as a space. Spaces become `%s`; shell metacharacters get a
/// backslash so they survive the second parse.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ' ' => escaped.push_str("%s"),
            '\\' | '\'' | '"' | '`' | '$' | '&' | '|' | ';' | '(' | ')' | '<' | '>' | '*'
            | '~' | '#' | '?' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}
