//! Device bridge for droidpilot.
//!
//! Wraps the adb binary behind the [`DeviceBridge`] trait: device
//! enumeration, window and display introspection, hierarchy dumps,
//! frame statistics, input injection, and the live touch event stream.
//! The engine crate consumes the trait; tests swap in in-memory bridges.

pub mod adb;
pub mod bridge;
pub mod companion;
pub mod devices;
pub mod input;
pub mod parse;
pub mod watch;

pub use adb::{Adb, AdbOutput};
pub use bridge::{AdbBridge, DeviceBridge, DisplayGeometry, WindowState};
pub use devices::{Device, DeviceState};
pub use input::KeyCode;
pub use parse::events::{TouchEvent, TouchEventKind};
pub use watch::TouchEventStream;
