/*
 * X11 backend.
 *
 * X11 has no window procedure to subclass, so the host toolkit keeps
 * delivering pointer events and forwards them through
 * `FramelessManager::dispatch` (`decode_event` turns raw x11rb events into
 * messages). What this backend adds over the plain fallback is the window
 * manager integration: EWMH `_NET_WM_MOVERESIZE` for moves and resizes,
 * `_GTK_SHOW_WINDOW_MENU` for the window menu, and screen metrics read from
 * root window properties.
 *
 * The backend's own connection selects property changes on the root window.
 * A watcher thread turns `RESOURCE_MANAGER` updates into `ThemeChanged`, so
 * theme tracking does not depend on the host forwarding root events.
 */

use super::{InstalledHook, PlatformBackend};
use crate::error::Result;
use crate::hittest::{NET_WM_MOVERESIZE_MOVE, moveresize_direction};
use crate::host::HostWindow;
use crate::interceptor::{MessageRouter, NativeMessage, NoDefault, PointerEvent};
use crate::menu::SystemMenuRequest;
use crate::registry::HookGuard;
use crate::types::{Dpi, MouseButton, Point, Rect, ResizeEdges, WindowHandle};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::{
    Atom, AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ConnectionExt as _, EventMask, Window,
};
use x11rb::rust_connection::RustConnection;

/// Source indication for requests coming from a normal application.
const SOURCE_APPLICATION: u32 = 1;

struct Atoms {
    net_supported: Atom,
    net_wm_moveresize: Atom,
    net_workarea: Atom,
    net_current_desktop: Atom,
    net_wm_cm: Atom,
    gtk_show_window_menu: Atom,
}

impl Atoms {
    fn new(conn: &RustConnection, screen: usize) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> { Ok(conn.intern_atom(false, name.as_bytes())?.reply()?.atom) };

        Ok(Self {
            net_supported: intern("_NET_SUPPORTED")?,
            net_wm_moveresize: intern("_NET_WM_MOVERESIZE")?,
            net_workarea: intern("_NET_WORKAREA")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_wm_cm: intern(&format!("_NET_WM_CM_S{screen}"))?,
            gtk_show_window_menu: intern("_GTK_SHOW_WINDOW_MENU")?,
        })
    }
}

/// Events the backend selects on the root window of its own connection.
fn root_event_mask() -> EventMask {
    EventMask::PROPERTY_CHANGE
}

pub struct X11Backend {
    conn: Arc<RustConnection>,
    root: Window,
    screen_size_px: (u16, u16),
    screen_size_mm: (u16, u16),
    atoms: Atoms,
    watching: AtomicBool,
}

impl std::fmt::Debug for X11Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Backend").field("root", &self.root).finish_non_exhaustive()
    }
}

impl X11Backend {
    /// Connects to the display named by `$DISPLAY`.
    pub fn connect() -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let screen = &conn.setup().roots[screen_num];
        let root = screen.root;
        let screen_size_px = (screen.width_in_pixels, screen.height_in_pixels);
        let screen_size_mm = (screen.width_in_millimeters, screen.height_in_millimeters);
        let atoms = Atoms::new(&conn, screen_num)?;
        conn.change_window_attributes(root, &ChangeWindowAttributesAux::new().event_mask(root_event_mask()))?;
        conn.flush()?;
        log::debug!("x11: connected to screen {screen_num}, root {root:#x}");
        Ok(Self {
            conn: Arc::new(conn),
            root,
            screen_size_px,
            screen_size_mm,
            atoms,
            watching: AtomicBool::new(false),
        })
    }

    fn root_property32(&self, property: Atom, kind: AtomEnum, length: u32) -> Result<Vec<u32>> {
        let reply = self.conn.get_property(false, self.root, property, kind, 0, length)?.reply()?;
        Ok(reply.value32().map(Iterator::collect).unwrap_or_default())
    }

    fn wm_supports(&self, atom: Atom) -> bool {
        match self.root_property32(self.atoms.net_supported, AtomEnum::ATOM, 1024) {
            Ok(supported) => supported.contains(&atom),
            Err(err) => {
                log::warn!("x11: cannot read _NET_SUPPORTED: {err}");
                false
            }
        }
    }

    fn resource_database(&self) -> Result<String> {
        let reply = self
            .conn
            .get_property(false, self.root, AtomEnum::RESOURCE_MANAGER, AtomEnum::STRING, 0, u32::MAX / 4)?
            .reply()?;
        Ok(String::from_utf8_lossy(&reply.value).into_owned())
    }

    /*
     * Sends a root window client message. Move/resize requests need the
     * pointer grab released first or the window manager cannot take it over.
     */
    fn send_to_root(&self, window: WindowHandle, message_type: Atom, data: [u32; 5], ungrab: bool) -> Result<()> {
        if ungrab {
            self.conn.ungrab_pointer(x11rb::CURRENT_TIME)?;
        }
        let event = ClientMessageEvent::new(32, window.raw() as Window, message_type, data);
        self.conn.send_event(
            false,
            self.root,
            EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY,
            event,
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn move_resize(&self, window: WindowHandle, global: Point, direction: u32) -> bool {
        if !self.wm_supports(self.atoms.net_wm_moveresize) {
            return false;
        }
        let data = [global.x as u32, global.y as u32, direction, 1, SOURCE_APPLICATION];
        match self.send_to_root(window, self.atoms.net_wm_moveresize, data, true) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("x11: _NET_WM_MOVERESIZE for {window} failed: {err}");
                false
            }
        }
    }
}

impl PlatformBackend for X11Backend {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn install_hook(&self, window: WindowHandle, _router: Weak<dyn MessageRouter>) -> Result<InstalledHook> {
        log::debug!("x11: {window} is driven by host events");
        Ok(InstalledHook {
            original_proc: 0,
            guard: HookGuard::noop(window),
        })
    }

    fn watch_theme_changes(&self, router: Weak<dyn MessageRouter>) {
        if self.watching.swap(true, Ordering::SeqCst) {
            log::debug!("x11: theme changes are already watched");
            return;
        }
        let conn = Arc::clone(&self.conn);
        let spawned = std::thread::Builder::new()
            .name("x11-theme-watch".into())
            .spawn(move || watch_resource_changes(&conn, &router));
        if let Err(err) = spawned {
            log::warn!("x11: cannot start the theme watcher: {err}");
            self.watching.store(false, Ordering::SeqCst);
        }
    }

    fn primary_screen_dpi(&self) -> Option<Dpi> {
        match self.resource_database() {
            Ok(resources) => {
                if let Some(dpi) = parse_xft_dpi(&resources) {
                    return Some(Dpi::uniform(dpi));
                }
            }
            Err(err) => log::debug!("x11: no resource database: {err}"),
        }
        physical_dpi(self.screen_size_px, self.screen_size_mm)
    }

    fn work_area(&self, _window: WindowHandle) -> Option<Rect> {
        let desktop = self
            .root_property32(self.atoms.net_current_desktop, AtomEnum::CARDINAL, 1)
            .ok()
            .and_then(|values| values.first().copied())
            .unwrap_or(0) as usize;
        let areas = self.root_property32(self.atoms.net_workarea, AtomEnum::CARDINAL, 1024).ok()?;
        let area = areas.get(desktop * 4..desktop * 4 + 4)?;
        let (x, y) = (area[0] as i32, area[1] as i32);
        Some(Rect::new(x, y, x + area[2] as i32, y + area[3] as i32))
    }

    fn composition_enabled(&self) -> bool {
        self.conn
            .get_selection_owner(self.atoms.net_wm_cm)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .is_some_and(|reply| reply.owner != x11rb::NONE)
    }

    fn show_system_menu(&self, window: WindowHandle, host: &dyn HostWindow, request: &SystemMenuRequest) -> Result<()> {
        if !self.wm_supports(self.atoms.gtk_show_window_menu) {
            host.show_system_menu(request.anchor);
            return Ok(());
        }
        let data = [0, request.anchor.x as u32, request.anchor.y as u32, 0, 0];
        self.send_to_root(window, self.atoms.gtk_show_window_menu, data, true)
    }

    fn start_system_move(&self, window: WindowHandle, host: &dyn HostWindow, global: Point) -> bool {
        self.move_resize(window, global, NET_WM_MOVERESIZE_MOVE) || host.start_system_move(global)
    }

    fn start_system_resize(&self, window: WindowHandle, host: &dyn HostWindow, edges: ResizeEdges, global: Point) -> bool {
        match moveresize_direction(edges) {
            Some(direction) if self.move_resize(window, global, direction) => true,
            _ => host.start_system_resize(edges, global),
        }
    }
}

/// `Xft.dpi` from an X resource database string.
// Runs until the router is gone or the connection fails.
fn watch_resource_changes(conn: &RustConnection, router: &Weak<dyn MessageRouter>) {
    loop {
        let event = match conn.wait_for_event() {
            Ok(event) => event,
            Err(err) => {
                log::warn!("x11: theme watcher stopped: {err}");
                return;
            }
        };
        let Some((window, NativeMessage::ThemeChanged)) = decode_event(&event) else {
            continue;
        };
        let Some(router) = router.upgrade() else {
            log::debug!("x11: theme watcher finished");
            return;
        };
        router.route(window, NativeMessage::ThemeChanged, &mut NoDefault);
    }
}

fn parse_xft_dpi(resources: &str) -> Option<u32> {
    resources.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        if key.trim() != "Xft.dpi" {
            return None;
        }
        let dpi = value.trim().parse::<f64>().ok()?;
        (dpi > 0.0).then(|| dpi.round() as u32)
    })
}

fn physical_dpi(pixels: (u16, u16), millimeters: (u16, u16)) -> Option<Dpi> {
    if millimeters.0 == 0 || millimeters.1 == 0 {
        return None;
    }
    let per_axis = |px: u16, mm: u16| (f64::from(px) * 25.4 / f64::from(mm)).round() as u32;
    Some(Dpi {
        x: per_axis(pixels.0, millimeters.0),
        y: per_axis(pixels.1, millimeters.1),
    })
}

fn mouse_button(detail: u8) -> Option<MouseButton> {
    match detail {
        1 => Some(MouseButton::Left),
        2 => Some(MouseButton::Middle),
        3 => Some(MouseButton::Right),
        _ => None,
    }
}

/*
 * Maps an x11rb event a host received for one of its windows to the window
 * and message to pass to `FramelessManager::dispatch`. Events the chrome does
 * not consume yield `None`.
 */
pub fn decode_event(event: &Event) -> Option<(WindowHandle, NativeMessage)> {
    let pointer = |window: Window, event: PointerEvent, x: i16, y: i16, time: u32| {
        Some((
            WindowHandle(window as usize),
            NativeMessage::Pointer {
                event,
                global: Point::new(i32::from(x), i32::from(y)),
                timestamp_ms: u64::from(time),
            },
        ))
    };
    match event {
        Event::ButtonPress(e) => {
            let button = mouse_button(e.detail)?;
            pointer(e.event, PointerEvent::Press(button), e.root_x, e.root_y, e.time)
        }
        Event::ButtonRelease(e) => {
            let button = mouse_button(e.detail)?;
            pointer(e.event, PointerEvent::Release(button), e.root_x, e.root_y, e.time)
        }
        Event::MotionNotify(e) => pointer(e.event, PointerEvent::Move, e.root_x, e.root_y, e.time),
        Event::LeaveNotify(e) => pointer(e.event, PointerEvent::Leave, e.root_x, e.root_y, e.time),
        Event::ConfigureNotify(e) => Some((WindowHandle(e.window as usize), NativeMessage::SizeChanged)),
        Event::DestroyNotify(e) => Some((WindowHandle(e.window as usize), NativeMessage::Destroy)),
        Event::PropertyNotify(e) if e.atom == u32::from(AtomEnum::RESOURCE_MANAGER) => {
            Some((WindowHandle(e.window as usize), NativeMessage::ThemeChanged))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x11rb::protocol::xproto::{
        BUTTON_PRESS_EVENT, ButtonPressEvent, DESTROY_NOTIFY_EVENT, DestroyNotifyEvent, KeyButMask,
        PROPERTY_NOTIFY_EVENT, Property, PropertyNotifyEvent,
    };

    fn button_press(detail: u8) -> Event {
        Event::ButtonPress(ButtonPressEvent {
            response_type: BUTTON_PRESS_EVENT,
            detail,
            sequence: 0,
            time: 1_500,
            root: 1,
            event: 0x40_0001,
            child: 0,
            root_x: -20,
            root_y: 300,
            event_x: 5,
            event_y: 8,
            state: KeyButMask::from(0u16),
            same_screen: true,
        })
    }

    #[test]
    fn xft_dpi_is_read_from_the_resource_database() {
        let resources = "Xcursor.size:\t24\nXft.antialias:\t1\nXft.dpi:\t144.4\n";
        assert_eq!(parse_xft_dpi(resources), Some(144));
        assert_eq!(parse_xft_dpi("Xft.antialias: 1\n"), None);
        assert_eq!(parse_xft_dpi("Xft.dpi: zero\n"), None);
    }

    #[test]
    fn physical_dpi_requires_a_size() {
        assert_eq!(physical_dpi((1920, 1080), (508, 286)), Some(Dpi { x: 96, y: 96 }));
        assert_eq!(physical_dpi((1920, 1080), (0, 0)), None);
    }

    #[test]
    fn button_events_become_pointer_messages() {
        let (window, message) = decode_event(&button_press(1)).unwrap();

        assert_eq!(window, WindowHandle(0x40_0001));
        assert_eq!(
            message,
            NativeMessage::Pointer {
                event: PointerEvent::Press(MouseButton::Left),
                global: Point::new(-20, 300),
                timestamp_ms: 1_500,
            }
        );
        // Wheel buttons are not chrome input.
        assert_eq!(decode_event(&button_press(4)), None);
    }

    #[test]
    fn lifecycle_and_resource_changes_are_decoded() {
        let destroyed = Event::DestroyNotify(DestroyNotifyEvent {
            response_type: DESTROY_NOTIFY_EVENT,
            sequence: 0,
            event: 1,
            window: 0x40_0001,
        });
        let resources = Event::PropertyNotify(PropertyNotifyEvent {
            response_type: PROPERTY_NOTIFY_EVENT,
            sequence: 0,
            window: 1,
            atom: AtomEnum::RESOURCE_MANAGER.into(),
            time: 0,
            state: Property::NEW_VALUE,
        });

        assert_eq!(decode_event(&destroyed), Some((WindowHandle(0x40_0001), NativeMessage::Destroy)));
        assert_eq!(decode_event(&resources), Some((WindowHandle(1), NativeMessage::ThemeChanged)));
    }

    #[test]
    fn root_selection_includes_property_changes() {
        let mask = u32::from(root_event_mask());
        assert_ne!(mask & u32::from(EventMask::PROPERTY_CHANGE), 0);
    }
}
