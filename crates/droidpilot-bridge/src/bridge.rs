//! The device bridge trait and its adb-backed implementation.

use droidpilot_core::element::UiElement;
use droidpilot_core::gfx::GfxStats;
use droidpilot_core::observation::{ActiveWindow, Insets, Rotation, ScreenSize};
use droidpilot_core::prelude::*;

use crate::adb::Adb;
use crate::companion;
use crate::devices::{self, Device};
use crate::input::{Input, KeyCode};
use crate::parse::{gfxinfo, hierarchy, window};
use crate::watch::TouchEventStream;

/// Focus-related state read from the window manager.
#[derive(Debug, Clone, Default)]
pub struct WindowState {
    pub focused: Option<ActiveWindow>,
    pub intent_chooser: bool,
    /// Current rotation, when the dump reports one. Included here so a
    /// window refresh also corrects rotation without a second dump.
    pub rotation: Option<Rotation>,
}

/// Display shape read from the window manager.
#[derive(Debug, Clone, Copy)]
pub struct DisplayGeometry {
    pub size: ScreenSize,
    pub insets: Insets,
    pub rotation: Rotation,
    /// Dots per inch, when the device reports one.
    pub density: Option<u32>,
}

/// Everything the engine needs from a device.
///
/// The adb implementation is [`AdbBridge`]; engine tests substitute
/// in-memory bridges.
#[trait_variant::make(DeviceBridge: Send)]
pub trait LocalDeviceBridge {
    /// List devices known to the bridge.
    async fn devices(&self) -> Result<Vec<Device>>;

    /// Read the focused window and chooser state.
    async fn window_state(&self, serial: &str) -> Result<WindowState>;

    /// Read screen size, insets, rotation, and density.
    async fn display_geometry(&self, serial: &str) -> Result<DisplayGeometry>;

    /// Read just the current rotation.
    async fn rotation(&self, serial: &str) -> Result<Rotation>;

    /// Pin the display to a rotation. Returns once the command is
    /// accepted; the display settles asynchronously.
    async fn set_rotation(&self, serial: &str, rotation: Rotation) -> Result<()>;

    /// Read frame statistics for an app.
    async fn gfx_stats(&self, serial: &str, app_id: &str) -> Result<GfxStats>;

    /// Reset an app's frame statistics buffer.
    async fn reset_gfx_stats(&self, serial: &str, app_id: &str) -> Result<()>;

    /// Capture the screen as PNG bytes.
    async fn screenshot(&self, serial: &str) -> Result<Vec<u8>>;

    /// Dump the view hierarchy via uiautomator. `None` when the current
    /// surface yields no nodes.
    async fn dump_hierarchy(&self, serial: &str) -> Result<Option<UiElement>>;

    /// Whether the companion accessibility service is running.
    async fn companion_running(&self, serial: &str) -> Result<bool>;

    /// Read the companion's hierarchy snapshot.
    async fn companion_hierarchy(&self, serial: &str) -> Result<Option<UiElement>>;

    /// Open a live touch event stream.
    fn watch_touch_events(&self, serial: &str) -> Result<TouchEventStream>;

    async fn tap(&self, serial: &str, x: i32, y: i32) -> Result<()>;

    async fn long_press(&self, serial: &str, x: i32, y: i32) -> Result<()>;

    async fn swipe(
        &self,
        serial: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<()>;

    async fn type_text(&self, serial: &str, text: &str) -> Result<()>;

    async fn press_key(&self, serial: &str, key: KeyCode) -> Result<()>;

    async fn launch_app(&self, serial: &str, app_id: &str, activity: Option<&str>) -> Result<()>;

    async fn stop_app(&self, serial: &str, app_id: &str) -> Result<()>;
}

/// [`DeviceBridge`] backed by the adb binary.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb: Adb,
}

impl AdbBridge {
    /// Locate adb on PATH and build a bridge around it.
    pub fn locate() -> Result<Self> {
        Ok(Self { adb: Adb::locate()? })
    }

    pub fn new(adb: Adb) -> Self {
        Self { adb }
    }

    pub fn adb(&self) -> &Adb {
        &self.adb
    }

    fn input<'a>(&'a self, serial: &'a str) -> Input<'a> {
        Input::new(&self.adb, serial)
    }
}

impl DeviceBridge for AdbBridge {
    async fn devices(&self) -> Result<Vec<Device>> {
        devices::connected_devices(&self.adb).await
    }

    async fn window_state(&self, serial: &str) -> Result<WindowState> {
        let output = self.adb.shell(serial, &["dumpsys", "window"]).await?;
        Ok(WindowState {
            focused: window::parse_focused_window(&output),
            intent_chooser: window::detect_intent_chooser(&output),
            rotation: window::parse_rotation(&output),
        })
    }

    async fn display_geometry(&self, serial: &str) -> Result<DisplayGeometry> {
        let (size_out, density_out, window_out) = tokio::try_join!(
            self.adb.shell(serial, &["wm", "size"]),
            self.adb.shell(serial, &["wm", "density"]),
            self.adb.shell(serial, &["dumpsys", "window"]),
        )?;

        let size = window::parse_screen_size(&size_out)
            .ok_or_else(|| Error::protocol(format!("unparseable wm size output: {size_out}")))?;
        Ok(DisplayGeometry {
            size,
            insets: window::parse_system_insets(&window_out, size),
            rotation: window::parse_rotation(&window_out).unwrap_or(Rotation::Deg0),
            density: window::parse_density(&density_out),
        })
    }

    async fn rotation(&self, serial: &str) -> Result<Rotation> {
        let output = self.adb.shell(serial, &["dumpsys", "window"]).await?;
        if let Some(rotation) = window::parse_rotation(&output) {
            return Ok(rotation);
        }
        // Older builds only report orientation under dumpsys input.
        let output = self.adb.shell(serial, &["dumpsys", "input"]).await?;
        window::parse_rotation(&output)
            .ok_or_else(|| Error::protocol("no rotation in window or input dumps"))
    }

    async fn set_rotation(&self, serial: &str, rotation: Rotation) -> Result<()> {
        self.input(serial).set_rotation(rotation).await
    }

    async fn gfx_stats(&self, serial: &str, app_id: &str) -> Result<GfxStats> {
        let output = self
            .adb
            .shell(serial, &["dumpsys", "gfxinfo", app_id])
            .await?;
        Ok(gfxinfo::parse_gfxinfo(&output))
    }

    async fn reset_gfx_stats(&self, serial: &str, app_id: &str) -> Result<()> {
        self.adb
            .shell(serial, &["dumpsys", "gfxinfo", app_id, "reset"])
            .await
            .map(|_| ())
    }

    async fn screenshot(&self, serial: &str) -> Result<Vec<u8>> {
        let bytes = self.adb.exec_out(serial, &["screencap", "-p"]).await?;
        if bytes.is_empty() {
            return Err(Error::bridge("screencap produced no output"));
        }
        Ok(bytes)
    }

    async fn dump_hierarchy(&self, serial: &str) -> Result<Option<UiElement>> {
        let bytes = self
            .adb
            .exec_out(serial, &["uiautomator", "dump", "/dev/tty"])
            .await?;
        let text = String::from_utf8_lossy(&bytes);
        let Some(xml) = extract_dump_xml(&text) else {
            // Secure surfaces and mid-transition dumps come back without
            // a document at all.
            return Ok(None);
        };
        hierarchy::parse_hierarchy_xml(xml)
    }

    async fn companion_running(&self, serial: &str) -> Result<bool> {
        companion::companion_running(&self.adb, serial).await
    }

    async fn companion_hierarchy(&self, serial: &str) -> Result<Option<UiElement>> {
        companion::companion_hierarchy(&self.adb, serial).await
    }

    fn watch_touch_events(&self, serial: &str) -> Result<TouchEventStream> {
        TouchEventStream::open(&self.adb, serial)
    }

    async fn tap(&self, serial: &str, x: i32, y: i32) -> Result<()> {
        self.input(serial).tap(x, y).await
    }

    async fn long_press(&self, serial: &str, x: i32, y: i32) -> Result<()> {
        self.input(serial).long_press(x, y).await
    }

    async fn swipe(
        &self,
        serial: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<()> {
        self.input(serial).swipe(x1, y1, x2, y2, duration_ms).await
    }

    async fn type_text(&self, serial: &str, text: &str) -> Result<()> {
        self.input(serial).type_text(text).await
    }

    async fn press_key(&self, serial: &str, key: KeyCode) -> Result<()> {
        self.input(serial).press_key(key).await
    }

    async fn launch_app(&self, serial: &str, app_id: &str, activity: Option<&str>) -> Result<()> {
        self.input(serial).launch_app(app_id, activity).await
    }

    async fn stop_app(&self, serial: &str, app_id: &str) -> Result<()> {
        self.input(serial).stop_app(app_id).await
    }
}

/// Cut the XML document out of `uiautomator dump /dev/tty` output, which
/// appends a "UI hierchary dumped to" status line after the document.
fn extract_dump_xml(text: &str) -> Option<&str> {
    let start = text.find("<?xml").or_else(|| text.find("<hierarchy"))?;
    let end = text.rfind("</hierarchy>")? + "</hierarchy>".len();
    if end <= start {
        return None;
    }
    Some(&text[start..end])
}
