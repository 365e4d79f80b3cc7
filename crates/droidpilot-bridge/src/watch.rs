//! Live touch event stream over `getevent -lt`.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio::sync::mpsc;

use droidpilot_core::prelude::*;

use crate::adb::Adb;
use crate::parse::events::{parse_event_line, TouchEvent};

/// A running `getevent` subscription on one device.
///
/// Dropping the stream kills the device-side reader; the channel closes
/// once the forwarding task drains the remaining output.
pub struct TouchEventStream {
    child: Option<Child>,
    rx: mpsc::UnboundedReceiver<TouchEvent>,
}

impl TouchEventStream {
    /// Start streaming touch events from the device.
    pub fn open(adb: &Adb, serial: &str) -> Result<Self> {
        let mut child = adb.spawn_shell_stream(serial, &["getevent", "-lt"])?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::bridge("getevent stream has no stdout"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(event) = parse_event_line(&line) {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
            }
        });

        Ok(Self {
            child: Some(child),
            rx,
        })
    }

    /// Wrap a channel of pre-parsed events, with no device process behind
    /// it. Used by in-memory bridges in tests.
    pub fn from_channel(rx: mpsc::UnboundedReceiver<TouchEvent>) -> Self {
        Self { child: None, rx }
    }

    /// Receive the next touch event. `None` means the stream ended.
    pub async fn recv(&mut self) -> Option<TouchEvent> {
        self.rx.recv().await
    }

    /// Whether the device-side process is still running.
    pub fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }
}
