//! Parsers for the text and XML surfaces adb exposes.
//!
//! Each submodule owns one dump format: `window` for dumpsys window and
//! `wm size`, `gfxinfo` for frame statistics, `hierarchy` for uiautomator
//! XML dumps, `events` for the getevent stream.

pub mod events;
pub mod gfxinfo;
pub mod hierarchy;
pub mod window;
