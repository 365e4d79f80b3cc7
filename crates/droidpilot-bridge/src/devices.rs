//! Device enumeration using `adb devices -l`

use serde::{Deserialize, Serialize};

use droidpilot_core::prelude::*;

use crate::adb::Adb;

/// Connection state reported by adb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceState {
    /// Ready for commands.
    Device,
    /// Visible but not ready (booting, reconnecting).
    Offline,
    /// Connected but not authorized for debugging.
    Unauthorized,
    /// Anything else adb prints.
    Unknown,
}

impl DeviceState {
    fn parse(s: &str) -> Self {
        match s {
            "device" => DeviceState::Device,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            _ => DeviceState::Unknown,
        }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, DeviceState::Device)
    }
}

/// A device known to the adb server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Serial number / transport address (e.g. "emulator-5554").
    pub serial: String,

    pub state: DeviceState,

    /// Product name from `-l` output.
    #[serde(default)]
    pub product: Option<String>,

    /// Model name from `-l` output.
    #[serde(default)]
    pub model: Option<String>,

    /// adb transport id from `-l` output.
    #[serde(default)]
    pub transport_id: Option<u32>,
}

impl Device {
    /// Whether this is an emulator (by serial convention).
    pub fn is_emulator(&self) -> bool {
        self.serial.starts_with("emulator-")
    }

    /// Check if the device matches a specifier: exact serial, or a
    /// case-insensitive substring of the model/product name.
    pub fn matches(&self, specifier: &str) -> bool {
        if self.serial == specifier {
            return true;
        }
        let spec_lower = specifier.to_lowercase();
        if let Some(model) = &self.model {
            if model.to_lowercase().contains(&spec_lower) {
                return true;
            }
        }
        if let Some(product) = &self.product {
            if product.to_lowercase().contains(&spec_lower) {
                return true;
            }
        }
        false
    }
}

/// List devices known to the adb server.
pub async fn connected_devices(adb: &Adb) -> Result<Vec<Device>> {
    let output = adb.run(&["devices", "-l"]).await?;
    Ok(parse_devices_output(&output.stdout))
}

/// Parse `adb devices -l` output.
///
/// Typical output:
/// ```text
/// List of devices attached
/// emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 device:emu64x transport_id:1
/// 94ABX0EF12             device usb:1-4 product:raven model:Pixel_6_Pro device:raven transport_id:2
/// 0A3B1C9D               offline transport_id:3
/// ```
pub fn parse_devices_output(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("List of devices")
                && !line.starts_with('*') // daemon startup banner lines
        })
        .filter_map(parse_device_line)
        .collect()
}

fn parse_device_line(line: &str) -> Option<Device> {
    let mut fields = line.split_whitespace();
    let serial = fields.next()?.to_string();
    let state = DeviceState::parse(fields.next()?);

    let mut product = None;
    let mut model = None;
    let mut transport_id = None;
    for field in fields {
        if let Some((key, value)) = field.split_once(':') {
            match key {
                "product" => product = Some(value.to_string()),
                "model" => model = Some(value.to_string()),
                "transport_id" => transport_id = value.parse().ok(),
                _ => {}
            }
        }
    }

    Some(Device {
        serial,
        state,
        product,
        model,
        transport_id,
    })
}

/// Find a device matching the given specifier.
///
/// `auto` picks the single ready device; with several connected it returns
/// the first ready one (the session registry layers unlocked-first selection
/// on top of this).
pub fn find_device<'a>(devices: &'a [Device], specifier: &str) -> Option<&'a Device> {
    if specifier.eq_ignore_ascii_case("auto") {
        return devices.iter().find(|d| d.state.is_ready());
    }
    devices.iter().find(|d| d.matches(specifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OUTPUT: &str = "\
List of devices attached
emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 device:emu64x transport_id:1
94ABX0EF12             device usb:1-4 product:raven model:Pixel_6_Pro device:raven transport_id:2
0A3B1C9D               offline transport_id:3
";

    #[test]
    fn test_parse_devices_output() {
        let devices = parse_devices_output(SAMPLE_OUTPUT);

        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert!(devices[0].is_emulator());
        assert!(devices[0].state.is_ready());
        assert_eq!(devices[0].transport_id, Some(1));

        assert_eq!(devices[1].model.as_deref(), Some("Pixel_6_Pro"));
        assert!(!devices[1].is_emulator());

        assert_eq!(devices[2].state, DeviceState::Offline);
        assert!(devices[2].model.is_none());
    }

    #[test]
    fn test_parse_devices_with_daemon_banner() {
        let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
emulator-5554\tdevice
";
        let devices = parse_devices_output(output);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].serial, "emulator-5554");
    }

    #[test]
    fn test_parse_devices_empty() {
        let devices = parse_devices_output("List of devices attached\n\n");
        assert!(devices.is_empty());
    }

    #[test]
    fn test_parse_devices_unauthorized() {
        let output = "List of devices attached\n94ABX0EF12  unauthorized transport_id:4\n";
        let devices = parse_devices_output(output);
        assert_eq!(devices[0].state, DeviceState::Unauthorized);
        assert!(!devices[0].state.is_ready());
    }

    #[test]
    fn test_device_matches() {
        let devices = parse_devices_output(SAMPLE_OUTPUT);

        assert!(devices[0].matches("emulator-5554"));
        assert!(devices[1].matches("pixel"));
        assert!(devices[1].matches("raven"));
        assert!(!devices[1].matches("emulator-5554"));
    }

    #[test]
    fn test_find_device() {
        let devices = parse_devices_output(SAMPLE_OUTPUT);

        assert_eq!(
            find_device(&devices, "94ABX0EF12").unwrap().serial,
            "94ABX0EF12"
        );
        assert_eq!(find_device(&devices, "Pixel").unwrap().serial, "94ABX0EF12");

        // auto picks the first ready device
        assert_eq!(find_device(&devices, "auto").unwrap().serial, "emulator-5554");
        assert_eq!(find_device(&devices, "AUTO").unwrap().serial, "emulator-5554");

        assert!(find_device(&devices, "nope").is_none());
    }

    #[test]
    fn test_find_device_auto_skips_offline() {
        let output = "List of devices attached\nX1 offline\nX2 device\n";
        let devices = parse_devices_output(output);
        assert_eq!(find_device(&devices, "auto").unwrap().serial, "X2");
    }
}
