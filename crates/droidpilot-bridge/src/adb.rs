//! adb command invocation
//!
//! Every bridge operation boils down to running the `adb` binary with an
//! argument list and parsing what comes back. This module owns the process
//! plumbing: binary lookup, timeouts, exit-code handling, and the
//! classification of "the device is gone" failures.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use droidpilot_core::prelude::*;

/// Default hard timeout for a single adb invocation
const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Handle to a located adb binary.
#[derive(Debug, Clone)]
pub struct Adb {
    binary: PathBuf,
    command_timeout: Duration,
}

/// Captured output of one adb invocation.
#[derive(Debug, Clone)]
pub struct AdbOutput {
    pub stdout: String,
    pub stderr: String,
}

impl Adb {
    /// Locate adb on PATH.
    pub fn locate() -> Result<Self> {
        let binary = which::which("adb").map_err(|_| Error::AdbNotFound)?;
        debug!("adb located at {}", binary.display());
        Ok(Self {
            binary,
            command_timeout: COMMAND_TIMEOUT,
        })
    }

    /// Use an explicit adb binary path (custom SDK locations, tests).
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            command_timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, command_timeout: Duration) -> Self {
        self.command_timeout = command_timeout;
        self
    }

    /// Run `adb <args>` without a device scope (e.g. `adb devices -l`).
    pub async fn run(&self, args: &[&str]) -> Result<AdbOutput> {
        self.run_scoped(None, args).await
    }

    /// Run `adb -s <serial> <args>`.
    pub async fn run_for(&self, serial: &str, args: &[&str]) -> Result<AdbOutput> {
        self.run_scoped(Some(serial), args).await
    }

    /// Run `adb -s <serial> shell <args>` and return stdout.
    pub async fn shell(&self, serial: &str, args: &[&str]) -> Result<String> {
        let mut full = vec!["shell"];
        full.extend_from_slice(args);
        Ok(self.run_for(serial, &full).await?.stdout)
    }

    /// Run `adb -s <serial> exec-out <args>` and return raw stdout bytes.
    ///
    /// `exec-out` skips the pty layer, so binary payloads (screenshots,
    /// snapshot files) come through unmangled.
    pub async fn exec_out(&self, serial: &str, args: &[&str]) -> Result<Vec<u8>> {
        let mut full = vec!["-s", serial, "exec-out"];
        full.extend_from_slice(args);

        let output = self.spawn_and_wait(&full).await?;

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        classify_device_errors(serial, &stderr)?;

        if !output.status.success() {
            return Err(Error::bridge(format!(
                "adb exec-out {:?} failed with exit code {:?}: {}",
                args,
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn run_scoped(&self, serial: Option<&str>, args: &[&str]) -> Result<AdbOutput> {
        let mut full: Vec<&str> = Vec::with_capacity(args.len() + 2);
        if let Some(serial) = serial {
            full.push("-s");
            full.push(serial);
        }
        full.extend_from_slice(args);

        let output = self.spawn_and_wait(&full).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if let Some(serial) = serial {
            classify_device_errors(serial, &stderr)?;
            // Some adb builds print device errors on stdout.
            classify_device_errors(serial, &stdout)?;
        }

        // Be lenient with exit codes: several shell tools (dumpsys among
        // them) exit non-zero while still printing usable output.
        if !output.status.success() && stdout.trim().is_empty() {
            return Err(Error::bridge(format!(
                "adb {:?} failed with exit code {:?}: {}",
                args,
                output.status.code(),
                stderr.trim()
            )));
        }

        Ok(AdbOutput { stdout, stderr })
    }

    async fn spawn_and_wait(&self, args: &[&str]) -> Result<std::process::Output> {
        trace!("adb {}", args.join(" "));

        let fut = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.command_timeout, fut)
            .await
            .map_err(|_| {
                Error::bridge(format!(
                    "adb {:?} timed out after {:?}",
                    args, self.command_timeout
                ))
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::AdbNotFound
                } else {
                    Error::bridge(format!("failed to run adb: {}", e))
                }
            })?;

        Ok(output)
    }

    /// Spawn a long-running `adb -s <serial> shell <args>` child with piped
    /// stdout (event streams). The caller owns the child; `kill_on_drop` is
    /// set so dropping it tears the stream down.
    pub fn spawn_shell_stream(
        &self,
        serial: &str,
        args: &[&str],
    ) -> Result<tokio::process::Child> {
        let mut full: Vec<&str> = vec!["-s", serial, "shell"];
        full.extend_from_slice(args);

        debug!("adb (stream) {}", full.join(" "));

        Command::new(&self.binary)
            .args(&full)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::AdbNotFound
                } else {
                    Error::bridge(format!("failed to spawn adb stream: {}", e))
                }
            })
    }
}

/// Map the transport-level "device is gone" messages to
/// [`Error::DeviceUnreachable`]. These are not retry-worthy: the cable was
/// pulled, the emulator died, or the serial never existed.
fn classify_device_errors(serial: &str, text: &str) -> Result<()> {
    let lowered = text.to_lowercase();
    let unreachable = lowered.contains("device offline")
        || lowered.contains("device unauthorized")
        || (lowered.contains("error:") && lowered.contains("not found"))
        || lowered.contains("no devices/emulators found");

    if unreachable {
        warn!(serial, "device unreachable: {}", text.trim());
        return Err(Error::device_unreachable(serial));
    }
    Ok(())
}
