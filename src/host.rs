/*
 * The host toolkit capability interface.
 *
 * The chrome engine never owns the window: everything it needs to know about,
 * or do to, the host window goes through `HostWindow`. Toolkit bindings
 * implement the trait directly (one implementation per binding); hosts that
 * prefer wiring closures can fill a `SystemParameters` bundle instead, which
 * is validated for completeness before it is accepted.
 *
 * Implementations are shared with native callbacks, hence `Send + Sync`. They
 * are only ever called on the thread that runs the host's event loop.
 */

use crate::types::{
    ButtonState, CursorShape, Point, ResizeEdges, Size, SystemButtonType, ToolkitFlavor,
    WindowFlags, WindowHandle, WindowState,
};

use std::sync::Arc;

pub trait HostWindow: Send + Sync {
    fn window_id(&self) -> WindowHandle;

    fn window_flags(&self) -> WindowFlags;
    fn set_window_flags(&self, flags: WindowFlags);

    fn size(&self) -> Size;
    fn set_size(&self, size: Size);

    fn position(&self) -> Point;
    fn set_position(&self, position: Point);

    fn is_fixed_size(&self) -> bool;
    fn set_fixed_size(&self, fixed: bool);

    fn window_state(&self) -> WindowState;
    fn set_window_state(&self, state: WindowState);

    fn map_from_global(&self, global: Point) -> Point;
    fn map_to_global(&self, local: Point) -> Point;

    /// Returns the identity of the synthetic caption button under `local`, if any.
    fn is_inside_system_buttons(&self, local: Point) -> Option<SystemButtonType>;
    fn is_inside_title_bar_draggable_area(&self, local: Point) -> bool;

    fn device_pixel_ratio(&self) -> f64;

    fn set_system_button_state(&self, button: SystemButtonType, state: ButtonState);

    /// True where an interactive host widget sits inside the caption strip and
    /// must receive the mouse instead of the drag logic.
    fn should_ignore_mouse_events(&self, local: Point) -> bool;

    fn show_system_menu(&self, global: Point);

    fn toolkit_flavor(&self) -> ToolkitFlavor;

    /*
     * Asks the toolkit to start a window-manager driven move. Returns false
     * when the toolkit cannot, in which case the engine moves the window itself.
     */
    fn start_system_move(&self, _global: Point) -> bool {
        false
    }

    fn start_system_resize(&self, _edges: ResizeEdges, _global: Point) -> bool {
        false
    }

    fn set_cursor_shape(&self, _shape: CursorShape) {}

    /// Whether every capability the engine needs is present.
    fn missing_capabilities(&self) -> Vec<&'static str> {
        Vec::new()
    }
}

type Getter<T> = Arc<dyn Fn() -> T + Send + Sync>;
type Setter<T> = Arc<dyn Fn(T) + Send + Sync>;
type PointQuery<T> = Arc<dyn Fn(Point) -> T + Send + Sync>;

/*
 * Closure-based `HostWindow`. Every field is required; a bundle with any unset
 * callback reports it through `missing_capabilities` and the registry refuses
 * it. Accessors on an incomplete bundle return neutral defaults instead of
 * panicking.
 */
#[derive(Clone, Default)]
pub struct SystemParameters {
    pub window_id: Option<Getter<WindowHandle>>,
    pub get_window_flags: Option<Getter<WindowFlags>>,
    pub set_window_flags: Option<Setter<WindowFlags>>,
    pub get_window_size: Option<Getter<Size>>,
    pub set_window_size: Option<Setter<Size>>,
    pub get_window_position: Option<Getter<Point>>,
    pub set_window_position: Option<Setter<Point>>,
    pub is_window_fixed_size: Option<Getter<bool>>,
    pub set_window_fixed_size: Option<Setter<bool>>,
    pub get_window_state: Option<Getter<WindowState>>,
    pub set_window_state: Option<Setter<WindowState>>,
    pub map_from_global: Option<PointQuery<Point>>,
    pub map_to_global: Option<PointQuery<Point>>,
    pub is_inside_system_buttons: Option<PointQuery<Option<SystemButtonType>>>,
    pub is_inside_title_bar_draggable_area: Option<PointQuery<bool>>,
    pub get_window_device_pixel_ratio: Option<Getter<f64>>,
    pub set_system_button_state: Option<Arc<dyn Fn(SystemButtonType, ButtonState) + Send + Sync>>,
    pub should_ignore_mouse_events: Option<PointQuery<bool>>,
    pub show_system_menu: Option<Setter<Point>>,
    pub get_toolkit_flavor: Option<Getter<ToolkitFlavor>>,
}

impl std::fmt::Debug for SystemParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemParameters")
            .field("missing", &self.missing_capabilities())
            .finish()
    }
}

impl SystemParameters {
    pub fn is_valid(&self) -> bool {
        HostWindow::missing_capabilities(self).is_empty()
    }
}

fn get<T: Default>(getter: &Option<Getter<T>>) -> T {
    getter.as_ref().map(|f| f()).unwrap_or_default()
}

impl HostWindow for SystemParameters {
    fn window_id(&self) -> WindowHandle {
        get(&self.window_id)
    }

    fn window_flags(&self) -> WindowFlags {
        get(&self.get_window_flags)
    }

    fn set_window_flags(&self, flags: WindowFlags) {
        if let Some(f) = &self.set_window_flags {
            f(flags);
        }
    }

    fn size(&self) -> Size {
        get(&self.get_window_size)
    }

    fn set_size(&self, size: Size) {
        if let Some(f) = &self.set_window_size {
            f(size);
        }
    }

    fn position(&self) -> Point {
        get(&self.get_window_position)
    }

    fn set_position(&self, position: Point) {
        if let Some(f) = &self.set_window_position {
            f(position);
        }
    }

    fn is_fixed_size(&self) -> bool {
        get(&self.is_window_fixed_size)
    }

    fn set_fixed_size(&self, fixed: bool) {
        if let Some(f) = &self.set_window_fixed_size {
            f(fixed);
        }
    }

    fn window_state(&self) -> WindowState {
        get(&self.get_window_state)
    }

    fn set_window_state(&self, state: WindowState) {
        if let Some(f) = &self.set_window_state {
            f(state);
        }
    }

    fn map_from_global(&self, global: Point) -> Point {
        self.map_from_global.as_ref().map_or(global, |f| f(global))
    }

    fn map_to_global(&self, local: Point) -> Point {
        self.map_to_global.as_ref().map_or(local, |f| f(local))
    }

    fn is_inside_system_buttons(&self, local: Point) -> Option<SystemButtonType> {
        self.is_inside_system_buttons.as_ref().and_then(|f| f(local))
    }

    fn is_inside_title_bar_draggable_area(&self, local: Point) -> bool {
        self.is_inside_title_bar_draggable_area
            .as_ref()
            .is_some_and(|f| f(local))
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.get_window_device_pixel_ratio
            .as_ref()
            .map_or(1.0, |f| f())
    }

    fn set_system_button_state(&self, button: SystemButtonType, state: ButtonState) {
        if let Some(f) = &self.set_system_button_state {
            f(button, state);
        }
    }

    fn should_ignore_mouse_events(&self, local: Point) -> bool {
        self.should_ignore_mouse_events
            .as_ref()
            .is_some_and(|f| f(local))
    }

    fn show_system_menu(&self, global: Point) {
        if let Some(f) = &self.show_system_menu {
            f(global);
        }
    }

    fn toolkit_flavor(&self) -> ToolkitFlavor {
        get(&self.get_toolkit_flavor)
    }

    fn missing_capabilities(&self) -> Vec<&'static str> {
        let checks: [(&'static str, bool); 20] = [
            ("window_id", self.window_id.is_some()),
            ("get_window_flags", self.get_window_flags.is_some()),
            ("set_window_flags", self.set_window_flags.is_some()),
            ("get_window_size", self.get_window_size.is_some()),
            ("set_window_size", self.set_window_size.is_some()),
            ("get_window_position", self.get_window_position.is_some()),
            ("set_window_position", self.set_window_position.is_some()),
            ("is_window_fixed_size", self.is_window_fixed_size.is_some()),
            ("set_window_fixed_size", self.set_window_fixed_size.is_some()),
            ("get_window_state", self.get_window_state.is_some()),
            ("set_window_state", self.set_window_state.is_some()),
            ("map_from_global", self.map_from_global.is_some()),
            ("map_to_global", self.map_to_global.is_some()),
            ("is_inside_system_buttons", self.is_inside_system_buttons.is_some()),
            (
                "is_inside_title_bar_draggable_area",
                self.is_inside_title_bar_draggable_area.is_some(),
            ),
            (
                "get_window_device_pixel_ratio",
                self.get_window_device_pixel_ratio.is_some(),
            ),
            ("set_system_button_state", self.set_system_button_state.is_some()),
            ("should_ignore_mouse_events", self.should_ignore_mouse_events.is_some()),
            ("show_system_menu", self.show_system_menu.is_some()),
            ("get_toolkit_flavor", self.get_toolkit_flavor.is_some()),
        ];
        checks
            .into_iter()
            .filter_map(|(name, present)| (!present).then_some(name))
            .collect()
    }
}
