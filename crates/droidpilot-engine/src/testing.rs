//! Scripted in-memory bridge for engine tests.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::Mutex;

use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::mpsc;

use droidpilot_bridge::devices::{Device, DeviceState};
use droidpilot_bridge::{DeviceBridge, DisplayGeometry, KeyCode, TouchEventStream, WindowState};
use droidpilot_core::element::{Bounds, UiElement};
use droidpilot_core::gfx::{GfxCounters, GfxPercentiles, GfxStats};
use droidpilot_core::observation::{ActiveWindow, Insets, Rotation, ScreenSize};
use droidpilot_core::prelude::*;

const PALETTE: &[[u8; 4]] = &[
    [20, 20, 20, 255],
    [200, 60, 60, 255],
    [60, 200, 60, 255],
    [60, 60, 200, 255],
    [220, 220, 40, 255],
    [40, 220, 220, 255],
    [220, 40, 220, 255],
    [120, 120, 120, 255],
];

struct State {
    devices: Vec<Device>,
    rotations: VecDeque<Rotation>,
    current_rotation: Rotation,
    gfx: GfxCounters,
    gfx_janky: Option<GfxCounters>,
    total_frames: u64,
    percentiles: GfxPercentiles,
    screen: usize,
    dump_calls: u32,
    screenshot_calls: u32,
    reset_calls: u32,
    dump_fails: u32,
    screenshot_fails: u32,
    companion: bool,
    companion_tree: Option<UiElement>,
    chooser: bool,
    focused: Option<ActiveWindow>,
    actions: Vec<String>,
    fail_action: Option<(&'static str, u32)>,
    action_changes_screen: bool,
}

/// A [`DeviceBridge`] whose responses are scripted from the test body.
///
/// Screens are numbered; the screenshot for screen N is a solid color
/// from a palette and the hierarchy is a small tree labeled with N, so
/// cache and change-detection logic sees consistent pixels and nodes.
pub struct FakeBridge {
    inner: Mutex<State>,
}

impl Default for FakeBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBridge {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State {
                devices: vec![Device {
                    serial: "emulator-5554".into(),
                    state: DeviceState::Device,
                    product: Some("sdk_gphone64_x86_64".into()),
                    model: Some("sdk_gphone64_x86_64".into()),
                    transport_id: Some(1),
                }],
                rotations: VecDeque::new(),
                current_rotation: Rotation::Deg0,
                gfx: GfxCounters::default(),
                gfx_janky: None,
                total_frames: 0,
                percentiles: GfxPercentiles::default(),
                screen: 0,
                dump_calls: 0,
                screenshot_calls: 0,
                reset_calls: 0,
                dump_fails: 0,
                screenshot_fails: 0,
                companion: false,
                companion_tree: None,
                chooser: false,
                focused: Some(ActiveWindow {
                    app_id: "com.example.app".into(),
                    activity: Some("com.example.app.MainActivity".into()),
                }),
                actions: Vec::new(),
                fail_action: None,
                action_changes_screen: true,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().unwrap()
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        self.lock().devices = devices;
    }

    /// Script rotation() responses; the last value repeats forever.
    pub fn set_rotation_sequence(&self, rotations: Vec<Rotation>) {
        let mut state = self.lock();
        state.rotations = rotations.into();
    }

    /// Make every gfx sample advance the counters by this delta.
    pub fn set_gfx_janky(&self, delta: GfxCounters) {
        self.lock().gfx_janky = Some(delta);
    }

    pub fn set_percentiles(&self, percentiles: GfxPercentiles) {
        self.lock().percentiles = percentiles;
    }

    pub fn set_screen(&self, screen: usize) {
        self.lock().screen = screen;
    }

    pub fn screen(&self) -> usize {
        self.lock().screen
    }

    pub fn set_companion(&self, running: bool, tree: Option<UiElement>) {
        let mut state = self.lock();
        state.companion = running;
        state.companion_tree = tree;
    }

    pub fn set_chooser(&self, chooser: bool) {
        self.lock().chooser = chooser;
    }

    pub fn set_focused(&self, focused: Option<ActiveWindow>) {
        self.lock().focused = focused;
    }

    /// Fail the next `n` hierarchy dumps with a bridge error.
    pub fn fail_next_dumps(&self, n: u32) {
        self.lock().dump_fails = n;
    }

    pub fn fail_next_screenshots(&self, n: u32) {
        self.lock().screenshot_fails = n;
    }

    /// Make one input method fail every call ("tap", "swipe", ...).
    pub fn set_fail_action(&self, tool: Option<&'static str>) {
        self.lock().fail_action = tool.map(|t| (t, u32::MAX));
    }

    /// Make one input method fail its next `times` calls, then recover.
    pub fn set_fail_action_times(&self, tool: &'static str, times: u32) {
        self.lock().fail_action = Some((tool, times));
    }

    /// Whether state-changing inputs advance the screen number.
    pub fn set_action_changes_screen(&self, changes: bool) {
        self.lock().action_changes_screen = changes;
    }

    pub fn dump_calls(&self) -> u32 {
        self.lock().dump_calls
    }

    pub fn screenshot_calls(&self) -> u32 {
        self.lock().screenshot_calls
    }

    pub fn reset_calls(&self) -> u32 {
        self.lock().reset_calls
    }

    pub fn actions(&self) -> Vec<String> {
        self.lock().actions.clone()
    }

    /// The hierarchy tree shown on a given screen number.
    pub fn screen_tree(screen: usize) -> UiElement {
        UiElement {
            class: Some("android.widget.FrameLayout".into()),
            bounds: Some(Bounds::new(0, 0, 1080, 2400)),
            enabled: true,
            children: vec![
                UiElement {
                    text: Some(format!("screen-{screen}")),
                    class: Some("android.widget.TextView".into()),
                    bounds: Some(Bounds::new(0, 100, 1080, 200)),
                    enabled: true,
                    ..UiElement::default()
                },
                UiElement {
                    text: Some("Next".into()),
                    class: Some("android.widget.Button".into()),
                    resource_id: Some("com.example.app:id/next".into()),
                    bounds: Some(Bounds::new(100, 2000, 980, 2150)),
                    clickable: true,
                    enabled: true,
                    focusable: true,
                    ..UiElement::default()
                },
            ],
            ..UiElement::default()
        }
    }

    fn record_action(&self, tool: &'static str, entry: String, changes_screen: bool) -> Result<()> {
        let mut state = self.lock();
        if let Some((failing, remaining)) = state.fail_action {
            if failing == tool && remaining > 0 {
                if remaining != u32::MAX {
                    state.fail_action = Some((failing, remaining - 1));
                }
                return Err(Error::bridge(format!("{tool} injection failed")));
            }
        }
        state.actions.push(entry);
        if changes_screen && state.action_changes_screen {
            state.screen += 1;
        }
        Ok(())
    }
}

fn screen_png(screen: usize) -> Vec<u8> {
    let color = PALETTE[screen % PALETTE.len()];
    let img = RgbaImage::from_pixel(64, 64, Rgba(color));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

impl DeviceBridge for FakeBridge {
    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.lock().devices.clone())
    }

    async fn window_state(&self, _serial: &str) -> Result<WindowState> {
        let state = self.lock();
        Ok(WindowState {
            focused: state.focused.clone(),
            intent_chooser: state.chooser,
            rotation: Some(state.current_rotation),
        })
    }

    async fn display_geometry(&self, _serial: &str) -> Result<DisplayGeometry> {
        let state = self.lock();
        Ok(DisplayGeometry {
            size: ScreenSize {
                width: 1080,
                height: 2400,
            },
            insets: Insets {
                top: 80,
                bottom: 132,
                left: 0,
                right: 0,
            },
            rotation: state.current_rotation,
            density: Some(420),
        })
    }

    async fn rotation(&self, _serial: &str) -> Result<Rotation> {
        let mut state = self.lock();
        if let Some(next) = state.rotations.pop_front() {
            state.current_rotation = next;
        }
        Ok(state.current_rotation)
    }

    async fn set_rotation(&self, _serial: &str, rotation: Rotation) -> Result<()> {
        let mut state = self.lock();
        state.actions.push(format!("set_rotation {}", rotation.degrees()));
        state.rotations.push_back(rotation);
        Ok(())
    }

    async fn gfx_stats(&self, _serial: &str, _app_id: &str) -> Result<GfxStats> {
        let mut state = self.lock();
        if let Some(delta) = state.gfx_janky {
            state.gfx.missed_vsync += delta.missed_vsync;
            state.gfx.slow_ui_thread += delta.slow_ui_thread;
            state.gfx.frame_deadline_missed += delta.frame_deadline_missed;
            state.total_frames += 1;
        }
        Ok(GfxStats::new(state.gfx, state.percentiles, state.total_frames))
    }

    async fn reset_gfx_stats(&self, _serial: &str, _app_id: &str) -> Result<()> {
        let mut state = self.lock();
        state.reset_calls += 1;
        state.gfx = GfxCounters::default();
        state.total_frames = 0;
        Ok(())
    }

    async fn screenshot(&self, _serial: &str) -> Result<Vec<u8>> {
        let mut state = self.lock();
        state.screenshot_calls += 1;
        if state.screenshot_fails > 0 {
            state.screenshot_fails -= 1;
            return Err(Error::bridge("screencap failed"));
        }
        Ok(screen_png(state.screen))
    }

    async fn dump_hierarchy(&self, _serial: &str) -> Result<Option<UiElement>> {
        let mut state = self.lock();
        state.dump_calls += 1;
        if state.dump_fails > 0 {
            state.dump_fails -= 1;
            return Err(Error::bridge("uiautomator dump failed"));
        }
        Ok(Some(Self::screen_tree(state.screen)))
    }

    async fn companion_running(&self, _serial: &str) -> Result<bool> {
        Ok(self.lock().companion)
    }

    async fn companion_hierarchy(&self, _serial: &str) -> Result<Option<UiElement>> {
        Ok(self.lock().companion_tree.clone())
    }

    fn watch_touch_events(&self, _serial: &str) -> Result<TouchEventStream> {
        let (_tx, rx) = mpsc::unbounded_channel();
        Ok(TouchEventStream::from_channel(rx))
    }

    async fn tap(&self, _serial: &str, x: i32, y: i32) -> Result<()> {
        self.record_action("tap", format!("tap {x},{y}"), true)
    }

    async fn long_press(&self, _serial: &str, x: i32, y: i32) -> Result<()> {
        self.record_action("long_press", format!("long_press {x},{y}"), true)
    }

    async fn swipe(
        &self,
        _serial: &str,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
        duration_ms: u64,
    ) -> Result<()> {
        self.record_action(
            "swipe",
            format!("swipe {x1},{y1} -> {x2},{y2} over {duration_ms}ms"),
            true,
        )
    }

    async fn type_text(&self, _serial: &str, text: &str) -> Result<()> {
        self.record_action("type_text", format!("type_text {text}"), true)
    }

    async fn press_key(&self, _serial: &str, key: KeyCode) -> Result<()> {
        self.record_action("press_key", format!("press_key {}", key.code()), true)
    }

    async fn launch_app(&self, _serial: &str, app_id: &str, activity: Option<&str>) -> Result<()> {
        let entry = match activity {
            Some(activity) => format!("launch_app {app_id}/{activity}"),
            None => format!("launch_app {app_id}"),
        };
        self.record_action("launch_app", entry, true)
    }

    async fn stop_app(&self, _serial: &str, app_id: &str) -> Result<()> {
        self.record_action("stop_app", format!("stop_app {app_id}"), true)
    }
}
