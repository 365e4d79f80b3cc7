//! Error types with retry/fatality classification

use thiserror::Error;

use crate::observation::Observation;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Common/Infrastructure Errors
    // ─────────────────────────────────────────────────────────────
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Image error: {message}")]
    Image { message: String },

    // ─────────────────────────────────────────────────────────────
    // Device Bridge Errors
    // ─────────────────────────────────────────────────────────────
    #[error("adb not found. Ensure 'adb' is in your PATH.")]
    AdbNotFound,

    #[error("Device unreachable: {serial}")]
    DeviceUnreachable { serial: String },

    #[error("No connected devices")]
    NoDevices,

    #[error("No device matches specifier: {specifier}")]
    DeviceNotFound { specifier: String },

    #[error("Bridge command error: {message}")]
    Bridge { message: String },

    #[error("Bridge output parse error: {message}")]
    Protocol { message: String },

    // ─────────────────────────────────────────────────────────────
    // Session / Interaction Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Device session busy: {serial}")]
    SessionBusy { serial: String },

    #[error("Rotation to {target}° not reached within {waited_ms}ms")]
    RotationTimeout { target: u16, waited_ms: u64 },

    #[error("Expected UI change did not occur: {message}")]
    Actionable {
        message: String,
        /// Observation taken before the action ran.
        before: Box<Observation>,
        /// Observation taken after the action ran.
        after: Box<Observation>,
    },

    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    // ─────────────────────────────────────────────────────────────
    // Channel/Communication Errors
    // ─────────────────────────────────────────────────────────────
    #[error("Channel send error: {message}")]
    ChannelSend { message: String },

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

// ─────────────────────────────────────────────────────────────────
// Convenience Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn image(message: impl Into<String>) -> Self {
        Self::Image {
            message: message.into(),
        }
    }

    pub fn device_unreachable(serial: impl Into<String>) -> Self {
        Self::DeviceUnreachable {
            serial: serial.into(),
        }
    }

    pub fn device_not_found(specifier: impl Into<String>) -> Self {
        Self::DeviceNotFound {
            specifier: specifier.into(),
        }
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn session_busy(serial: impl Into<String>) -> Self {
        Self::SessionBusy {
            serial: serial.into(),
        }
    }

    pub fn actionable(
        message: impl Into<String>,
        before: Observation,
        after: Observation,
    ) -> Self {
        Self::Actionable {
            message: message.into(),
            before: Box::new(before),
            after: Box::new(after),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn channel_send(message: impl Into<String>) -> Self {
        Self::ChannelSend {
            message: message.into(),
        }
    }

    /// Check if this error should abort the whole plan immediately.
    ///
    /// An unreachable device or missing adb binary cannot be cured by
    /// re-running the step, so the executor halts without retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::AdbNotFound
                | Error::DeviceUnreachable { .. }
                | Error::NoDevices
                | Error::DeviceNotFound { .. }
                | Error::ConfigInvalid { .. }
        )
    }

    /// Check if a failed step may be retried with a fresh interaction cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Bridge { .. }
                | Error::Protocol { .. }
                | Error::RotationTimeout { .. }
                | Error::Actionable { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Context Extensions
// ─────────────────────────────────────────────────────────────────

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", context.into(), err);
            err
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err = e.into();
            tracing::error!("{}: {:?}", f(), err);
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Observation;

    #[test]
    fn test_error_display_messages() {
        let err = Error::bridge("command exited with code 1");
        assert_eq!(
            err.to_string(),
            "Bridge command error: command exited with code 1"
        );

        let err = Error::AdbNotFound;
        assert!(err.to_string().contains("adb not found"));

        let err = Error::RotationTimeout {
            target: 90,
            waited_ms: 512,
        };
        assert!(err.to_string().contains("90"));
        assert!(err.to_string().contains("512"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_fatal() {
        assert!(Error::AdbNotFound.is_fatal());
        assert!(Error::device_unreachable("emulator-5554").is_fatal());
        assert!(Error::NoDevices.is_fatal());
        assert!(!Error::bridge("transient").is_fatal());
        assert!(
            !Error::RotationTimeout {
                target: 90,
                waited_ms: 500
            }
            .is_fatal()
        );
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(Error::bridge("transient").is_retryable());
        assert!(Error::protocol("parse error").is_retryable());
        assert!(
            Error::RotationTimeout {
                target: 180,
                waited_ms: 500
            }
            .is_retryable()
        );
        assert!(!Error::AdbNotFound.is_retryable());
        assert!(!Error::device_unreachable("x").is_retryable());
    }

    #[test]
    fn test_actionable_carries_both_observations() {
        let before = Observation::empty();
        let mut after = Observation::empty();
        after.intent_chooser_detected = true;

        let err = Error::actionable("tap produced no change", before, after);
        match err {
            Error::Actionable { before, after, .. } => {
                assert!(!before.intent_chooser_detected);
                assert!(after.intent_chooser_detected);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
