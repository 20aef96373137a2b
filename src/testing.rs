/*
 * Test doubles shared by the unit tests: a scriptable host window, a backend
 * that records every OS-facing call, and a context wired from both.
 */

use crate::backend::{InstalledHook, PlatformBackend};
use crate::config::ChromeConfig;
use crate::error::Result;
use crate::host::HostWindow;
use crate::interceptor::{DefaultHandler, MessageRouter, NativeMessage, NoDefault, Outcome};
use crate::manager::ChromeContext;
use crate::menu::SystemMenuRequest;
use crate::registry::HookGuard;
use crate::theme::{ThemeObserver, ThemeSource};
use crate::types::{
    ButtonState, CursorShape, Dpi, Margins, Point, Rect, ResizeEdges, Size, SystemButtonType,
    ThemeSnapshot, ToolkitFlavor, WindowFlags, WindowHandle, WindowState,
};
use crate::version::{FeatureSet, OsFamily, WindowsRelease};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Default)]
struct HostState {
    flags: WindowFlags,
    size: Size,
    position: Point,
    fixed_size: bool,
    window_state: WindowState,
    caption: Option<Rect>,
    buttons: Vec<(SystemButtonType, Rect)>,
    ignored: Vec<Rect>,
    device_pixel_ratio: f64,
    flavor: ToolkitFlavor,
    supports_system_move: bool,
    missing: Vec<&'static str>,
    button_states: Vec<(SystemButtonType, ButtonState)>,
    menus_shown: Vec<Point>,
    cursor_shapes: Vec<CursorShape>,
    system_moves: Vec<Point>,
    system_resizes: Vec<(ResizeEdges, Point)>,
    sizes_set: usize,
}

/// A host window at the screen origin unless moved; local and global
/// coordinates differ by the window position.
#[derive(Debug)]
pub struct MockHost {
    handle: WindowHandle,
    state: Mutex<HostState>,
}

impl MockHost {
    pub fn new(handle: WindowHandle) -> Self {
        Self {
            handle,
            state: Mutex::new(HostState {
                size: Size::new(640, 480),
                device_pixel_ratio: 1.0,
                ..Default::default()
            }),
        }
    }

    pub fn with_size(mut self, size: Size) -> Self {
        self.state.get_mut().size = size;
        self
    }

    pub fn with_caption(mut self, caption: Rect) -> Self {
        self.state.get_mut().caption = Some(caption);
        self
    }

    pub fn with_button(mut self, button: SystemButtonType, area: Rect) -> Self {
        self.state.get_mut().buttons.push((button, area));
        self
    }

    pub fn with_fixed_size(mut self, fixed: bool) -> Self {
        self.state.get_mut().fixed_size = fixed;
        self
    }

    pub fn with_state(mut self, state: WindowState) -> Self {
        self.state.get_mut().window_state = state;
        self
    }

    pub fn with_ignored_area(mut self, area: Rect) -> Self {
        self.state.get_mut().ignored.push(area);
        self
    }

    pub fn with_flavor(mut self, flavor: ToolkitFlavor) -> Self {
        self.state.get_mut().flavor = flavor;
        self
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f64) -> Self {
        self.state.get_mut().device_pixel_ratio = ratio;
        self
    }

    /// Reports `capability` as missing, like an incomplete `SystemParameters`.
    pub fn missing(mut self, capability: &'static str) -> Self {
        self.state.get_mut().missing.push(capability);
        self
    }

    pub fn set_supports_system_move(&self, supported: bool) {
        self.state.lock().supports_system_move = supported;
    }

    pub fn button_states(&self) -> Vec<(SystemButtonType, ButtonState)> {
        self.state.lock().button_states.clone()
    }

    pub fn menus_shown(&self) -> Vec<Point> {
        self.state.lock().menus_shown.clone()
    }

    pub fn cursor_shapes(&self) -> Vec<CursorShape> {
        self.state.lock().cursor_shapes.clone()
    }

    pub fn system_moves(&self) -> Vec<Point> {
        self.state.lock().system_moves.clone()
    }

    pub fn sizes_set(&self) -> usize {
        self.state.lock().sizes_set
    }
}

impl HostWindow for MockHost {
    fn window_id(&self) -> WindowHandle {
        self.handle
    }

    fn window_flags(&self) -> WindowFlags {
        self.state.lock().flags
    }

    fn set_window_flags(&self, flags: WindowFlags) {
        self.state.lock().flags = flags;
    }

    fn size(&self) -> Size {
        self.state.lock().size
    }

    fn set_size(&self, size: Size) {
        let mut state = self.state.lock();
        state.size = size;
        state.sizes_set += 1;
    }

    fn position(&self) -> Point {
        self.state.lock().position
    }

    fn set_position(&self, position: Point) {
        self.state.lock().position = position;
    }

    fn is_fixed_size(&self) -> bool {
        self.state.lock().fixed_size
    }

    fn set_fixed_size(&self, fixed: bool) {
        self.state.lock().fixed_size = fixed;
    }

    fn window_state(&self) -> WindowState {
        self.state.lock().window_state
    }

    fn set_window_state(&self, state: WindowState) {
        self.state.lock().window_state = state;
    }

    fn map_from_global(&self, global: Point) -> Point {
        let origin = self.state.lock().position;
        Point::new(global.x - origin.x, global.y - origin.y)
    }

    fn map_to_global(&self, local: Point) -> Point {
        let origin = self.state.lock().position;
        local.offset(origin.x, origin.y)
    }

    fn is_inside_system_buttons(&self, local: Point) -> Option<SystemButtonType> {
        let state = self.state.lock();
        state
            .buttons
            .iter()
            .find(|(_, area)| area.contains(local))
            .map(|(button, _)| match button {
                SystemButtonType::Maximize if state.window_state.is_maximized() => SystemButtonType::Restore,
                other => *other,
            })
    }

    fn is_inside_title_bar_draggable_area(&self, local: Point) -> bool {
        self.state.lock().caption.is_some_and(|caption| caption.contains(local))
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.state.lock().device_pixel_ratio
    }

    fn set_system_button_state(&self, button: SystemButtonType, state: ButtonState) {
        self.state.lock().button_states.push((button, state));
    }

    fn should_ignore_mouse_events(&self, local: Point) -> bool {
        self.state.lock().ignored.iter().any(|area| area.contains(local))
    }

    fn show_system_menu(&self, global: Point) {
        self.state.lock().menus_shown.push(global);
    }

    fn toolkit_flavor(&self) -> ToolkitFlavor {
        self.state.lock().flavor
    }

    fn start_system_move(&self, global: Point) -> bool {
        let mut state = self.state.lock();
        if state.supports_system_move {
            state.system_moves.push(global);
        }
        state.supports_system_move
    }

    fn start_system_resize(&self, edges: ResizeEdges, global: Point) -> bool {
        let mut state = self.state.lock();
        if state.supports_system_move {
            state.system_resizes.push((edges, global));
        }
        state.supports_system_move
    }

    fn set_cursor_shape(&self, shape: CursorShape) {
        self.state.lock().cursor_shapes.push(shape);
    }

    fn missing_capabilities(&self) -> Vec<&'static str> {
        self.state.lock().missing.clone()
    }
}

#[derive(Debug, Default)]
struct BackendLog {
    installs: Vec<WindowHandle>,
    tracked_leaves: Vec<WindowHandle>,
    menus: Vec<(WindowHandle, SystemMenuRequest)>,
    margins: Vec<(WindowHandle, Margins)>,
    dark_title_bars: Vec<(WindowHandle, bool)>,
    round_corners: Vec<WindowHandle>,
    backdrops: Vec<WindowHandle>,
    helpers_created: Vec<WindowHandle>,
    helpers_destroyed: Vec<WindowHandle>,
    frame_changes: Vec<WindowHandle>,
    auto_hide_taskbar: ResizeEdges,
    work_area: Option<Rect>,
    window_dpi: Option<Dpi>,
    theme_watcher: Option<Weak<dyn MessageRouter>>,
}

/// Records every call; procedure addresses are `0x1000 + handle`.
#[derive(Debug, Default)]
pub struct MockBackend {
    log: Mutex<BackendLog>,
    restored: Arc<AtomicUsize>,
    composition: AtomicBool,
    fail_install: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_auto_hide_taskbar(&self, edges: ResizeEdges) {
        self.log.lock().auto_hide_taskbar = edges;
    }

    pub fn set_work_area(&self, area: Rect) {
        self.log.lock().work_area = Some(area);
    }

    pub fn set_window_dpi(&self, dpi: Dpi) {
        self.log.lock().window_dpi = Some(dpi);
    }

    pub fn set_composition(&self, enabled: bool) {
        self.composition.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_next_install(&self) {
        self.fail_install.store(true, Ordering::SeqCst);
    }

    pub fn installs(&self) -> Vec<WindowHandle> {
        self.log.lock().installs.clone()
    }

    pub fn restored(&self) -> usize {
        self.restored.load(Ordering::SeqCst)
    }

    pub fn tracked_leaves(&self) -> Vec<WindowHandle> {
        self.log.lock().tracked_leaves.clone()
    }

    pub fn menus(&self) -> Vec<(WindowHandle, SystemMenuRequest)> {
        self.log.lock().menus.clone()
    }

    pub fn margins(&self) -> Vec<(WindowHandle, Margins)> {
        self.log.lock().margins.clone()
    }

    pub fn dark_title_bars(&self) -> Vec<(WindowHandle, bool)> {
        self.log.lock().dark_title_bars.clone()
    }

    pub fn round_corners(&self) -> Vec<WindowHandle> {
        self.log.lock().round_corners.clone()
    }

    pub fn backdrops(&self) -> Vec<WindowHandle> {
        self.log.lock().backdrops.clone()
    }

    pub fn helpers_created(&self) -> Vec<WindowHandle> {
        self.log.lock().helpers_created.clone()
    }

    pub fn helpers_destroyed(&self) -> Vec<WindowHandle> {
        self.log.lock().helpers_destroyed.clone()
    }

    pub fn frame_changes(&self) -> Vec<WindowHandle> {
        self.log.lock().frame_changes.clone()
    }

    /// Delivers a theme-change signal the way a backend watcher would, through
    /// a window that is not registered. False when nothing is watching.
    pub fn signal_theme_change(&self) -> bool {
        let watcher = self.log.lock().theme_watcher.clone();
        let Some(router) = watcher.and_then(|weak| weak.upgrade()) else {
            return false;
        };
        router.route(WindowHandle(1), NativeMessage::ThemeChanged, &mut NoDefault);
        true
    }
}

impl PlatformBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn intercepts_native_messages(&self) -> bool {
        true
    }

    fn install_hook(&self, window: WindowHandle, _router: Weak<dyn MessageRouter>) -> Result<InstalledHook> {
        if self.fail_install.swap(false, Ordering::SeqCst) {
            return Err(crate::error::ChromeError::OperationFailed("SetWindowLongPtrW".into()));
        }
        self.log.lock().installs.push(window);
        let restored = Arc::clone(&self.restored);
        Ok(InstalledHook {
            original_proc: 0x1000 + window.raw(),
            guard: HookGuard::new(window, move || {
                restored.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }

    fn watch_theme_changes(&self, router: Weak<dyn MessageRouter>) {
        self.log.lock().theme_watcher = Some(router);
    }

    fn window_dpi(&self, _window: WindowHandle) -> Option<Dpi> {
        self.log.lock().window_dpi
    }

    fn work_area(&self, _window: WindowHandle) -> Option<Rect> {
        self.log.lock().work_area
    }

    fn auto_hide_taskbar_edges(&self, _window: WindowHandle) -> ResizeEdges {
        self.log.lock().auto_hide_taskbar
    }

    fn composition_enabled(&self) -> bool {
        self.composition.load(Ordering::SeqCst)
    }

    fn track_mouse_leave(&self, window: WindowHandle, _non_client: bool) -> bool {
        self.log.lock().tracked_leaves.push(window);
        true
    }

    fn update_frame_margins(&self, window: WindowHandle, margins: Margins) -> Result<()> {
        self.log.lock().margins.push((window, margins));
        Ok(())
    }

    fn notify_frame_changed(&self, window: WindowHandle) {
        self.log.lock().frame_changes.push(window);
    }

    fn show_system_menu(&self, window: WindowHandle, _host: &dyn HostWindow, request: &SystemMenuRequest) -> Result<()> {
        self.log.lock().menus.push((window, *request));
        Ok(())
    }

    fn set_dark_title_bar(&self, window: WindowHandle, dark: bool, _attribute: u32) -> Result<()> {
        self.log.lock().dark_title_bars.push((window, dark));
        Ok(())
    }

    fn set_round_corners(&self, window: WindowHandle, _round: bool) -> Result<()> {
        self.log.lock().round_corners.push(window);
        Ok(())
    }

    fn set_backdrop(&self, window: WindowHandle, _enabled: bool) -> Result<()> {
        self.log.lock().backdrops.push(window);
        Ok(())
    }

    fn create_snap_helper(&self, window: WindowHandle, _router: Weak<dyn MessageRouter>) -> Result<WindowHandle> {
        let helper = WindowHandle(window.raw() + 1);
        self.log.lock().helpers_created.push(helper);
        Ok(helper)
    }

    fn destroy_snap_helper(&self, helper: WindowHandle) {
        self.log.lock().helpers_destroyed.push(helper);
    }
}

/// Default procedure stand-in; counts how it was used.
#[derive(Debug, Default)]
pub struct RecordingDefault {
    pub result: isize,
    pub calc_size: Option<Rect>,
    pub forwarded: usize,
    pub suppressed: usize,
    pub calc_forwarded: usize,
}

impl DefaultHandler for RecordingDefault {
    fn forward(&mut self) -> isize {
        self.forwarded += 1;
        self.result
    }

    fn forward_suppressing_paint(&mut self) -> isize {
        self.suppressed += 1;
        self.result
    }

    fn forward_calc_size(&mut self) -> Option<Rect> {
        self.calc_forwarded += 1;
        self.calc_size
    }
}

pub struct NullRouter;

impl MessageRouter for NullRouter {
    fn route(&self, _window: WindowHandle, _message: NativeMessage, _default: &mut dyn DefaultHandler) -> Outcome {
        Outcome::Delegate
    }
}

/// Theme source whose snapshot tests can change between refreshes.
#[derive(Debug, Default, Clone)]
pub struct SharedThemeSource(pub Arc<Mutex<ThemeSnapshot>>);

impl ThemeSource for SharedThemeSource {
    fn snapshot(&self) -> Result<ThemeSnapshot> {
        Ok(self.0.lock().clone())
    }
}

pub fn test_features() -> FeatureSet {
    FeatureSet::new(OsFamily::Windows(WindowsRelease::Win11_22H2.version()))
}

/// A context on Windows 11 22H2 with an empty configuration and a light theme.
pub fn test_context(backend: Arc<MockBackend>) -> Arc<ChromeContext> {
    test_context_with(backend, SharedThemeSource::default(), test_features())
}

pub fn test_context_with(
    backend: Arc<MockBackend>,
    theme: SharedThemeSource,
    features: FeatureSet,
) -> Arc<ChromeContext> {
    let config = ChromeConfig::from_sources(|_| None, None).expect("empty configuration");
    ChromeContext::new(config, features, backend, ThemeObserver::new(Box::new(theme)))
}
