//! Integration with the on-device companion accessibility service.
//!
//! When installed, the companion maintains a JSON snapshot of the current
//! accessibility tree with fields uiautomator dumps lack (roles, live
//! state descriptions, supported actions, ranges). The bridge probes for
//! the service and reads the snapshot directly off external storage.

use droidpilot_core::element::UiElement;
use droidpilot_core::prelude::*;

use crate::adb::Adb;

/// Package id of the companion service.
pub const COMPANION_PACKAGE: &str = "dev.droidpilot.companion";

/// Where the service writes its latest snapshot.
const SNAPSHOT_PATH: &str = "/sdcard/Android/data/dev.droidpilot.companion/files/hierarchy.json";

/// Check whether the companion service process is alive.
pub async fn companion_running(adb: &Adb, serial: &str) -> Result<bool> {
    let output = adb.shell(serial, &["pidof", COMPANION_PACKAGE]).await?;
    Ok(output
        .split_whitespace()
        .any(|pid| pid.parse::<u32>().is_ok()))
}

/// Read and decode the companion's latest hierarchy snapshot.
///
/// Returns `None` when the snapshot file is missing or empty, which the
/// service signals on secure surfaces it is not allowed to introspect.
pub async fn companion_hierarchy(adb: &Adb, serial: &str) -> Result<Option<UiElement>> {
    let bytes = adb.exec_out(serial, &["cat", SNAPSHOT_PATH]).await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let text = String::from_utf8_lossy(&bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains("No such file or directory") {
        return Ok(None);
    }
    let root: UiElement = serde_json::from_str(trimmed)
        .map_err(|e| Error::protocol(format!("bad companion snapshot: {e}")))?;
    Ok(Some(root))
}
