/*
 * Win32 backend.
 *
 * Takes a window over by swapping its window procedure (`GWLP_WNDPROC`) for
 * `chrome_wnd_proc`, which decodes the non-client messages the chrome cares
 * about and hands them to the router registered for that window. Anything the
 * router does not answer goes to the procedure that was installed before.
 *
 * The hook table maps raw HWND values to the replaced procedure and a weak
 * router reference. It is a process-wide static because the OS calls the
 * procedure without any context pointer we control: `GWLP_USERDATA` belongs
 * to the host toolkit.
 */

use super::{InstalledHook, PlatformBackend};
use crate::error::{ChromeError, Result};
use crate::geometry::SystemMetric;
use crate::host::HostWindow;
use crate::interceptor::{DefaultHandler, MessageRouter, NativeMessage, Outcome, PointerEvent};
use crate::menu::{SystemMenuItem, SystemMenuRequest};
use crate::registry::HookGuard;
use crate::sysapi::{CapabilityLoader, Symbol};
use crate::types::{Dpi, Margins, MouseButton, Point, Rect, ResizeEdges, Size, WindowHandle};
use crate::version::FeatureSet;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, OnceLock, Weak};

use windows::Win32::{
    Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM},
    Graphics::Dwm::{DWMWINDOWATTRIBUTE, DwmExtendFrameIntoClientArea, DwmIsCompositionEnabled, DwmSetWindowAttribute},
    Graphics::Gdi::{GetDC, GetDeviceCaps, GetMonitorInfoW, LOGPIXELSX, LOGPIXELSY, MONITOR_DEFAULTTONEAREST, MONITORINFO, MonitorFromWindow, ReleaseDC},
    System::LibraryLoader::GetModuleHandleW,
    UI::Controls::MARGINS,
    UI::Input::KeyboardAndMouse::{TME_LEAVE, TME_NONCLIENT, TRACKMOUSEEVENT, TrackMouseEvent},
    UI::Shell::{APPBARDATA, SHAppBarMessage},
    UI::WindowsAndMessaging::{
        CallWindowProcW, CreateWindowExW, DefWindowProcW, DestroyWindow, EnableMenuItem, GWL_STYLE, GWLP_WNDPROC,
        GetClassInfoExW, GetSystemMenu, GetSystemMetrics, GetWindowLongPtrW, IsWindow, LWA_ALPHA, MF_BYCOMMAND,
        MF_ENABLED, MF_GRAYED, NCCALCSIZE_PARAMS, PostMessageW, RegisterClassExW, SM_CXPADDEDBORDER,
        SM_CXSIZEFRAME, SM_CYCAPTION, SWP_FRAMECHANGED, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOOWNERZORDER, SWP_NOSIZE,
        SWP_NOZORDER, SetLayeredWindowAttributes, SetMenuDefaultItem, SetWindowLongPtrW, SetWindowPos,
        TPM_RETURNCMD, TPM_RIGHTBUTTON, TrackPopupMenuEx, WNDCLASSEXW, WNDPROC, WS_CHILD,
        WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_VISIBLE,
    },
};
use windows::core::{BOOL, PCWSTR, w};

/// Message and command numbers from WinUser.h.
mod msg {
    pub const WM_SIZE: u32 = 0x0005;
    pub const WM_SETTEXT: u32 = 0x000C;
    pub const WM_SETTINGCHANGE: u32 = 0x001A;
    pub const WM_SETICON: u32 = 0x0080;
    pub const WM_NCDESTROY: u32 = 0x0082;
    pub const WM_NCCALCSIZE: u32 = 0x0083;
    pub const WM_NCHITTEST: u32 = 0x0084;
    pub const WM_NCPAINT: u32 = 0x0085;
    pub const WM_NCACTIVATE: u32 = 0x0086;
    pub const WM_NCMOUSEMOVE: u32 = 0x00A0;
    pub const WM_NCLBUTTONDOWN: u32 = 0x00A1;
    pub const WM_NCLBUTTONUP: u32 = 0x00A2;
    pub const WM_NCLBUTTONDBLCLK: u32 = 0x00A3;
    pub const WM_NCRBUTTONDOWN: u32 = 0x00A4;
    pub const WM_NCRBUTTONUP: u32 = 0x00A5;
    pub const WM_NCRBUTTONDBLCLK: u32 = 0x00A6;
    pub const WM_NCMBUTTONDOWN: u32 = 0x00A7;
    pub const WM_NCMBUTTONUP: u32 = 0x00A8;
    pub const WM_NCMBUTTONDBLCLK: u32 = 0x00A9;
    pub const WM_SYSCOMMAND: u32 = 0x0112;
    pub const WM_NCMOUSELEAVE: u32 = 0x02A2;
    pub const WM_DPICHANGED: u32 = 0x02E0;
    pub const WM_THEMECHANGED: u32 = 0x031A;
    pub const WM_DWMCOLORIZATIONCOLORCHANGED: u32 = 0x0320;

    pub const SC_SIZE: u32 = 0xF000;
    pub const SC_MOVE: u32 = 0xF010;
    pub const SC_MINIMIZE: u32 = 0xF020;
    pub const SC_MAXIMIZE: u32 = 0xF030;
    pub const SC_CLOSE: u32 = 0xF060;
    pub const SC_KEYMENU: u32 = 0xF100;
    pub const SC_RESTORE: u32 = 0xF120;

    pub const ABM_GETSTATE: u32 = 0x0004;
    pub const ABM_GETAUTOHIDEBAREX: u32 = 0x000B;
    pub const ABS_AUTOHIDE: usize = 0x0001;
    pub const ABE_LEFT: u32 = 0;
    pub const ABE_TOP: u32 = 1;
    pub const ABE_RIGHT: u32 = 2;
    pub const ABE_BOTTOM: u32 = 3;
}

const DWMWA_WINDOW_CORNER_PREFERENCE: i32 = 33;
const DWMWA_SYSTEMBACKDROP_TYPE: i32 = 38;
const DWMWCP_DONOTROUND: i32 = 1;
const DWMWCP_ROUND: i32 = 2;
const DWMSBT_NONE: i32 = 1;
const DWMSBT_MAINWINDOW: i32 = 2;

const WCA_ACCENT_POLICY: u32 = 19;
const ACCENT_DISABLED: u32 = 0;
const ACCENT_ENABLE_BLURBEHIND: u32 = 3;

#[repr(C)]
struct AccentPolicy {
    accent_state: u32,
    accent_flags: u32,
    gradient_color: u32,
    animation_id: u32,
}

#[repr(C)]
struct WindowCompositionAttribData {
    attribute: u32,
    data: *mut c_void,
    size: usize,
}

type GetDpiForWindowFn = unsafe extern "system" fn(HWND) -> u32;
type GetSystemMetricsForDpiFn = unsafe extern "system" fn(i32, u32) -> i32;
type SetWindowCompositionAttributeFn = unsafe extern "system" fn(HWND, *mut WindowCompositionAttribData) -> BOOL;

#[derive(Clone)]
struct HookEntry {
    original: isize,
    router: Weak<dyn MessageRouter>,
}

fn hooks() -> &'static Mutex<HashMap<usize, HookEntry>> {
    static HOOKS: OnceLock<Mutex<HashMap<usize, HookEntry>>> = OnceLock::new();
    HOOKS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Snap helper overlay -> router of the window it belongs to.
fn helpers() -> &'static Mutex<HashMap<usize, Weak<dyn MessageRouter>>> {
    static HELPERS: OnceLock<Mutex<HashMap<usize, Weak<dyn MessageRouter>>>> = OnceLock::new();
    HELPERS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn hwnd(window: WindowHandle) -> HWND {
    HWND(window.raw() as *mut c_void)
}

fn handle(hwnd: HWND) -> WindowHandle {
    WindowHandle(hwnd.0 as usize)
}

fn to_rect(rect: RECT) -> Rect {
    Rect::new(rect.left, rect.top, rect.right, rect.bottom)
}

fn to_win32_rect(rect: Rect) -> RECT {
    RECT {
        left: rect.left,
        top: rect.top,
        right: rect.right,
        bottom: rect.bottom,
    }
}

/// Screen point packed into a message `LPARAM`; coordinates are signed 16-bit.
fn point_from_lparam(lparam: isize) -> Point {
    Point::new((lparam & 0xFFFF) as u16 as i16 as i32, ((lparam >> 16) & 0xFFFF) as u16 as i16 as i32)
}

/*
 * Translates a raw message into the interceptor's vocabulary. `WM_NCCALCSIZE`
 * carries a pointer and is decoded by the window procedure itself.
 */
fn decode_message(message: u32, wparam: usize, lparam: isize) -> NativeMessage {
    let non_client = |event| NativeMessage::NonClientPointer {
        event,
        hit_code: wparam as i32,
        global: point_from_lparam(lparam),
    };
    match message {
        msg::WM_NCHITTEST => NativeMessage::HitTest {
            global: point_from_lparam(lparam),
        },
        msg::WM_NCMOUSEMOVE => non_client(PointerEvent::Move),
        msg::WM_NCLBUTTONDOWN => non_client(PointerEvent::Press(MouseButton::Left)),
        msg::WM_NCLBUTTONUP => non_client(PointerEvent::Release(MouseButton::Left)),
        msg::WM_NCLBUTTONDBLCLK => non_client(PointerEvent::DoubleClick(MouseButton::Left)),
        msg::WM_NCRBUTTONDOWN => non_client(PointerEvent::Press(MouseButton::Right)),
        msg::WM_NCRBUTTONUP => non_client(PointerEvent::Release(MouseButton::Right)),
        msg::WM_NCRBUTTONDBLCLK => non_client(PointerEvent::DoubleClick(MouseButton::Right)),
        msg::WM_NCMBUTTONDOWN => non_client(PointerEvent::Press(MouseButton::Middle)),
        msg::WM_NCMBUTTONUP => non_client(PointerEvent::Release(MouseButton::Middle)),
        msg::WM_NCMBUTTONDBLCLK => non_client(PointerEvent::DoubleClick(MouseButton::Middle)),
        msg::WM_NCMOUSELEAVE => NativeMessage::NonClientPointer {
            event: PointerEvent::Leave,
            hit_code: 0,
            global: Point::default(),
        },
        msg::WM_NCACTIVATE => NativeMessage::Activate { active: wparam != 0 },
        msg::WM_NCPAINT => NativeMessage::NonClientPaint,
        msg::WM_SETTEXT | msg::WM_SETICON => NativeMessage::SetTextOrIcon,
        msg::WM_DPICHANGED => NativeMessage::DpiChanged {
            dpi: Dpi {
                x: (wparam & 0xFFFF) as u32,
                y: ((wparam >> 16) & 0xFFFF) as u32,
            },
        },
        msg::WM_SIZE => NativeMessage::SizeChanged,
        msg::WM_SYSCOMMAND if (wparam as u32 & 0xFFF0) == msg::SC_KEYMENU && lparam == b' ' as isize => {
            NativeMessage::KeyboardMenu
        }
        msg::WM_SETTINGCHANGE | msg::WM_THEMECHANGED | msg::WM_DWMCOLORIZATIONCOLORCHANGED => {
            NativeMessage::ThemeChanged
        }
        msg::WM_NCDESTROY => NativeMessage::Destroy,
        _ => NativeMessage::Other,
    }
}

/// The previous procedure of one message, callable on demand.
struct Win32Default {
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
    original: isize,
}

impl Win32Default {
    fn call(&self) -> LRESULT {
        unsafe {
            if self.original == 0 {
                DefWindowProcW(self.hwnd, self.message, self.wparam, self.lparam)
            } else {
                let previous: WNDPROC = std::mem::transmute(self.original);
                CallWindowProcW(previous, self.hwnd, self.message, self.wparam, self.lparam)
            }
        }
    }
}

impl DefaultHandler for Win32Default {
    fn forward(&mut self) -> isize {
        self.call().0
    }

    fn forward_suppressing_paint(&mut self) -> isize {
        unsafe {
            let style = GetWindowLongPtrW(self.hwnd, GWL_STYLE);
            SetWindowLongPtrW(self.hwnd, GWL_STYLE, style & !(WS_VISIBLE.0 as isize));
            let result = self.call();
            SetWindowLongPtrW(self.hwnd, GWL_STYLE, style);
            result.0
        }
    }

    fn forward_calc_size(&mut self) -> Option<Rect> {
        if self.message != msg::WM_NCCALCSIZE || self.wparam.0 == 0 {
            return None;
        }
        self.call();
        // SAFETY: for WM_NCCALCSIZE with wParam TRUE, lParam points to NCCALCSIZE_PARAMS.
        let params = unsafe { &*(self.lparam.0 as *const NCCALCSIZE_PARAMS) };
        Some(to_rect(params.rgrc[0]))
    }
}

/*
 * Decodes the message, routes it and writes the outcome back in the form
 * Windows expects.
 */
unsafe fn dispatch(router: &dyn MessageRouter, window: WindowHandle, default: &mut Win32Default) -> LRESULT {
    let calc_size = default.message == msg::WM_NCCALCSIZE && default.wparam.0 != 0;
    let message = if calc_size {
        let params = unsafe { &*(default.lparam.0 as *const NCCALCSIZE_PARAMS) };
        NativeMessage::CalcClientRect {
            proposed: to_rect(params.rgrc[0]),
        }
    } else {
        decode_message(default.message, default.wparam.0, default.lparam.0)
    };

    match router.route(window, message, default) {
        Outcome::Return(value) => LRESULT(value),
        Outcome::ClientRect { rect, result } => {
            if calc_size {
                let params = unsafe { &mut *(default.lparam.0 as *mut NCCALCSIZE_PARAMS) };
                params.rgrc[0] = to_win32_rect(rect);
            }
            LRESULT(result)
        }
        Outcome::Delegate => default.call(),
    }
}

unsafe extern "system" fn chrome_wnd_proc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let entry = hooks().lock().get(&(hwnd.0 as usize)).cloned();
    let Some(entry) = entry else {
        return unsafe { DefWindowProcW(hwnd, message, wparam, lparam) };
    };
    let mut default = Win32Default {
        hwnd,
        message,
        wparam,
        lparam,
        original: entry.original,
    };
    match entry.router.upgrade() {
        Some(router) => unsafe { dispatch(&*router, handle(hwnd), &mut default) },
        None => default.call(),
    }
}

unsafe extern "system" fn snap_helper_wnd_proc(hwnd: HWND, message: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let router = helpers().lock().get(&(hwnd.0 as usize)).and_then(Weak::upgrade);
    if message == msg::WM_NCDESTROY {
        helpers().lock().remove(&(hwnd.0 as usize));
    }
    let mut default = Win32Default {
        hwnd,
        message,
        wparam,
        lparam,
        original: 0,
    };
    match router {
        Some(router) if message != msg::WM_NCDESTROY => unsafe { dispatch(&*router, handle(hwnd), &mut default) },
        _ => default.call(),
    }
}

/*
 * Puts the previous procedure back, unless something else subclassed the
 * window after us. In that case our procedure has to stay in the chain, so the
 * entry is kept with a dead router and passes everything through.
 */
fn restore_hook(raw: usize) {
    let window = HWND(raw as *mut c_void);
    let mut hooks = hooks().lock();
    let Some(entry) = hooks.get_mut(&raw) else {
        return;
    };
    unsafe {
        let current = GetWindowLongPtrW(window, GWLP_WNDPROC);
        #[allow(clippy::fn_to_numeric_cast)]
        let ours = chrome_wnd_proc as isize;
        if current == ours {
            SetWindowLongPtrW(window, GWLP_WNDPROC, entry.original);
            hooks.remove(&raw);
            log::debug!("win32: restored window procedure of {raw:#x}");
        } else {
            log::warn!("win32: {raw:#x} was subclassed after the chrome hook; leaving a pass-through");
            entry.router = Weak::<crate::manager::ChromeContext>::new();
        }
    }
}

const SNAP_HELPER_CLASS: PCWSTR = w!("FramelessChromeSnapHelper");

fn register_snap_helper_class() -> Result<()> {
    static REGISTERED: OnceLock<bool> = OnceLock::new();
    let registered = *REGISTERED.get_or_init(|| unsafe {
        let Ok(instance) = GetModuleHandleW(None) else {
            return false;
        };
        let mut existing = WNDCLASSEXW::default();
        if GetClassInfoExW(Some(instance.into()), SNAP_HELPER_CLASS, &mut existing).is_ok() {
            return true;
        }
        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(snap_helper_wnd_proc),
            hInstance: instance.into(),
            lpszClassName: SNAP_HELPER_CLASS,
            ..Default::default()
        };
        let atom = RegisterClassExW(&class);
        if atom == 0 {
            log::error!("win32: RegisterClassExW for the snap helper failed");
        }
        atom != 0
    });
    if registered {
        Ok(())
    } else {
        Err(ChromeError::FeatureUnavailable("snap helper window class".into()))
    }
}

#[derive(Debug)]
pub struct Win32Backend {
    features: FeatureSet,
    loader: Arc<CapabilityLoader>,
}

impl Win32Backend {
    pub fn new(features: FeatureSet, loader: Arc<CapabilityLoader>) -> Self {
        Self { features, loader }
    }

    fn set_dwm_attribute(&self, window: WindowHandle, attribute: i32, value: i32) -> Result<()> {
        unsafe {
            DwmSetWindowAttribute(
                hwnd(window),
                DWMWINDOWATTRIBUTE(attribute),
                &value as *const i32 as *const c_void,
                std::mem::size_of_val(&value) as u32,
            )?;
        }
        Ok(())
    }

    fn monitor_info(&self, window: WindowHandle) -> Option<MONITORINFO> {
        unsafe {
            let monitor = MonitorFromWindow(hwnd(window), MONITOR_DEFAULTTONEAREST);
            if monitor.is_invalid() {
                return None;
            }
            let mut info = MONITORINFO {
                cbSize: std::mem::size_of::<MONITORINFO>() as u32,
                ..Default::default()
            };
            if GetMonitorInfoW(monitor, &mut info).as_bool() {
                Some(info)
            } else {
                log::warn!("win32: GetMonitorInfoW failed for {window}");
                None
            }
        }
    }

    /// Legacy blur-behind through the undocumented accent policy.
    fn set_accent_blur(&self, window: WindowHandle, enabled: bool) -> Result<()> {
        let set_attribute = unsafe {
            self.loader
                .resolve_fn::<SetWindowCompositionAttributeFn>("user32.dll", Symbol::Named("SetWindowCompositionAttribute"))
        }
        .ok_or_else(|| ChromeError::FeatureUnavailable("SetWindowCompositionAttribute".into()))?;

        let mut policy = AccentPolicy {
            accent_state: if enabled { ACCENT_ENABLE_BLURBEHIND } else { ACCENT_DISABLED },
            accent_flags: 0,
            gradient_color: 0,
            animation_id: 0,
        };
        let mut data = WindowCompositionAttribData {
            attribute: WCA_ACCENT_POLICY,
            data: &mut policy as *mut AccentPolicy as *mut c_void,
            size: std::mem::size_of::<AccentPolicy>(),
        };
        if unsafe { set_attribute(hwnd(window), &mut data) }.as_bool() {
            Ok(())
        } else {
            Err(ChromeError::OperationFailed("SetWindowCompositionAttribute".into()))
        }
    }
}

impl PlatformBackend for Win32Backend {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn intercepts_native_messages(&self) -> bool {
        true
    }

    fn install_hook(&self, window: WindowHandle, router: Weak<dyn MessageRouter>) -> Result<InstalledHook> {
        let target = hwnd(window);
        if !unsafe { IsWindow(Some(target)) }.as_bool() {
            return Err(ChromeError::InvalidHandle(window.to_string()));
        }
        let raw = window.raw();
        if hooks().lock().contains_key(&raw) {
            return Err(ChromeError::OperationFailed(format!("{window} is already hooked")));
        }
        // The entry must exist before the swap: the new procedure can run immediately.
        let previous = unsafe { GetWindowLongPtrW(target, GWLP_WNDPROC) };
        hooks().lock().insert(
            raw,
            HookEntry {
                original: previous,
                router,
            },
        );
        #[allow(clippy::fn_to_numeric_cast)]
        let replaced = unsafe { SetWindowLongPtrW(target, GWLP_WNDPROC, chrome_wnd_proc as isize) };
        if replaced == 0 {
            hooks().lock().remove(&raw);
            return Err(ChromeError::OperationFailed(format!(
                "SetWindowLongPtrW(GWLP_WNDPROC) on {window}: {}",
                windows::core::Error::from_win32()
            )));
        }
        log::debug!("win32: hooked {window}, previous procedure {previous:#x}");
        Ok(InstalledHook {
            original_proc: previous as usize,
            guard: HookGuard::new(window, move || restore_hook(raw)),
        })
    }

    fn window_dpi(&self, window: WindowHandle) -> Option<Dpi> {
        let get_dpi = unsafe {
            self.loader
                .resolve_fn::<GetDpiForWindowFn>("user32.dll", Symbol::Named("GetDpiForWindow"))
        }?;
        let dpi = unsafe { get_dpi(hwnd(window)) };
        (dpi > 0).then(|| Dpi::uniform(dpi))
    }

    fn primary_screen_dpi(&self) -> Option<Dpi> {
        unsafe {
            let screen = GetDC(None);
            if screen.is_invalid() {
                return None;
            }
            let dpi = Dpi {
                x: GetDeviceCaps(Some(screen), LOGPIXELSX) as u32,
                y: GetDeviceCaps(Some(screen), LOGPIXELSY) as u32,
            };
            ReleaseDC(None, screen);
            dpi.is_valid().then_some(dpi)
        }
    }

    fn system_metric(&self, metric: SystemMetric, dpi: u32) -> Option<i32> {
        let index = match metric {
            SystemMetric::ResizeFrame => SM_CXSIZEFRAME,
            SystemMetric::PaddedBorder => SM_CXPADDEDBORDER,
            SystemMetric::CaptionHeight => SM_CYCAPTION,
        };
        let for_dpi = unsafe {
            self.loader
                .resolve_fn::<GetSystemMetricsForDpiFn>("user32.dll", Symbol::Named("GetSystemMetricsForDpi"))
        };
        let value = match for_dpi {
            Some(for_dpi) => unsafe { for_dpi(index.0, dpi) },
            // Without the per-DPI query the metric is only right at the system DPI.
            None if self.primary_screen_dpi().is_some_and(|system| system.y == dpi) => unsafe { GetSystemMetrics(index) },
            None => return None,
        };
        (value > 0).then_some(value)
    }

    fn work_area(&self, window: WindowHandle) -> Option<Rect> {
        self.monitor_info(window).map(|info| to_rect(info.rcWork))
    }

    fn auto_hide_taskbar_edges(&self, window: WindowHandle) -> ResizeEdges {
        let mut data = APPBARDATA {
            cbSize: std::mem::size_of::<APPBARDATA>() as u32,
            ..Default::default()
        };
        let state = unsafe { SHAppBarMessage(msg::ABM_GETSTATE, &mut data) };
        if state & msg::ABS_AUTOHIDE == 0 {
            return ResizeEdges::empty();
        }
        let Some(info) = self.monitor_info(window) else {
            return ResizeEdges::empty();
        };

        let mut edges = ResizeEdges::empty();
        for (edge, flag) in [
            (msg::ABE_LEFT, ResizeEdges::LEFT),
            (msg::ABE_TOP, ResizeEdges::TOP),
            (msg::ABE_RIGHT, ResizeEdges::RIGHT),
            (msg::ABE_BOTTOM, ResizeEdges::BOTTOM),
        ] {
            data.uEdge = edge;
            data.rc = info.rcMonitor;
            if unsafe { SHAppBarMessage(msg::ABM_GETAUTOHIDEBAREX, &mut data) } != 0 {
                edges |= flag;
            }
        }
        edges
    }

    fn composition_enabled(&self) -> bool {
        unsafe { DwmIsCompositionEnabled() }.is_ok_and(|enabled| enabled.as_bool())
    }

    fn track_mouse_leave(&self, window: WindowHandle, non_client: bool) -> bool {
        let mut flags = TME_LEAVE;
        if non_client {
            flags |= TME_NONCLIENT;
        }
        let mut request = TRACKMOUSEEVENT {
            cbSize: std::mem::size_of::<TRACKMOUSEEVENT>() as u32,
            dwFlags: flags,
            hwndTrack: hwnd(window),
            dwHoverTime: 0,
        };
        match unsafe { TrackMouseEvent(&mut request) } {
            Ok(()) => true,
            Err(err) => {
                log::warn!("win32: TrackMouseEvent failed for {window}: {err}");
                false
            }
        }
    }

    fn update_frame_margins(&self, window: WindowHandle, margins: Margins) -> Result<()> {
        if !self.composition_enabled() {
            return Err(ChromeError::FeatureUnavailable("desktop composition".into()));
        }
        let margins = MARGINS {
            cxLeftWidth: margins.left,
            cxRightWidth: margins.right,
            cyTopHeight: margins.top,
            cyBottomHeight: margins.bottom,
        };
        unsafe { DwmExtendFrameIntoClientArea(hwnd(window), &margins)? };
        Ok(())
    }

    fn notify_frame_changed(&self, window: WindowHandle) {
        let flags = SWP_FRAMECHANGED | SWP_NOMOVE | SWP_NOSIZE | SWP_NOZORDER | SWP_NOACTIVATE | SWP_NOOWNERZORDER;
        if let Err(err) = unsafe { SetWindowPos(hwnd(window), None, 0, 0, 0, 0, flags) } {
            log::error!("win32: SetWindowPos(SWP_FRAMECHANGED) failed for {window}: {err}");
        }
    }

    /*
     * Shows the real system menu with items enabled for the window's state
     * and no default item, then posts the chosen command back to the window.
     */
    fn show_system_menu(&self, window: WindowHandle, _host: &dyn HostWindow, request: &SystemMenuRequest) -> Result<()> {
        let target = hwnd(window);
        unsafe {
            let menu = GetSystemMenu(target, false);
            if menu.is_invalid() {
                return Err(ChromeError::OperationFailed(format!("GetSystemMenu for {window}")));
            }
            for item in SystemMenuItem::ALL {
                let command = match item {
                    SystemMenuItem::Restore => msg::SC_RESTORE,
                    SystemMenuItem::Move => msg::SC_MOVE,
                    SystemMenuItem::Size => msg::SC_SIZE,
                    SystemMenuItem::Minimize => msg::SC_MINIMIZE,
                    SystemMenuItem::Maximize => msg::SC_MAXIMIZE,
                    SystemMenuItem::Close => msg::SC_CLOSE,
                };
                let state = if request.items.is_enabled(item) { MF_ENABLED } else { MF_GRAYED };
                let _ = EnableMenuItem(menu, command, MF_BYCOMMAND | state);
            }
            let _ = SetMenuDefaultItem(menu, u32::MAX, 0);

            let command = TrackPopupMenuEx(
                menu,
                (TPM_RETURNCMD | TPM_RIGHTBUTTON).0,
                request.anchor.x,
                request.anchor.y,
                target,
                None,
            );
            if command.0 != 0 {
                PostMessageW(Some(target), msg::WM_SYSCOMMAND, WPARAM(command.0 as usize), LPARAM(0))?;
            }
        }
        Ok(())
    }

    fn set_dark_title_bar(&self, window: WindowHandle, dark: bool, attribute: u32) -> Result<()> {
        self.set_dwm_attribute(window, attribute as i32, i32::from(dark))
    }

    fn set_round_corners(&self, window: WindowHandle, round: bool) -> Result<()> {
        if !self.features.supports_round_corners() {
            return Err(ChromeError::FeatureUnavailable("DWMWA_WINDOW_CORNER_PREFERENCE".into()));
        }
        let preference = if round { DWMWCP_ROUND } else { DWMWCP_DONOTROUND };
        self.set_dwm_attribute(window, DWMWA_WINDOW_CORNER_PREFERENCE, preference)
    }

    fn set_backdrop(&self, window: WindowHandle, enabled: bool) -> Result<()> {
        if self.features.supports_mica() {
            let backdrop = if enabled { DWMSBT_MAINWINDOW } else { DWMSBT_NONE };
            return self.set_dwm_attribute(window, DWMWA_SYSTEMBACKDROP_TYPE, backdrop);
        }
        self.set_accent_blur(window, enabled)
    }

    fn create_snap_helper(&self, window: WindowHandle, router: Weak<dyn MessageRouter>) -> Result<WindowHandle> {
        register_snap_helper_class()?;
        let helper = unsafe {
            let instance = GetModuleHandleW(None)?;
            let helper = CreateWindowExW(
                WS_EX_LAYERED | WS_EX_NOACTIVATE,
                SNAP_HELPER_CLASS,
                PCWSTR::null(),
                WS_CHILD | WS_VISIBLE,
                0,
                0,
                0,
                0,
                Some(hwnd(window)),
                None,
                Some(instance.into()),
                None,
            )?;
            // Fully transparent layered windows are not hit-tested; keep one alpha step.
            SetLayeredWindowAttributes(helper, COLORREF(0), 1, LWA_ALPHA)?;
            helper
        };
        helpers().lock().insert(helper.0 as usize, router);
        Ok(handle(helper))
    }

    fn resize_snap_helper(&self, helper: WindowHandle, size: Size) {
        let flags = SWP_NOMOVE | SWP_NOZORDER | SWP_NOACTIVATE | SWP_NOOWNERZORDER;
        if let Err(err) = unsafe { SetWindowPos(hwnd(helper), None, 0, 0, size.width, size.height, flags) } {
            log::warn!("win32: failed to resize snap helper {helper}: {err}");
        }
    }

    fn destroy_snap_helper(&self, helper: WindowHandle) {
        helpers().lock().remove(&helper.raw());
        if let Err(err) = unsafe { DestroyWindow(hwnd(helper)) } {
            log::warn!("win32: failed to destroy snap helper {helper}: {err}");
        }
    }

    fn migrate_to_monitor(&self, window: WindowHandle, host: &dyn HostWindow) {
        self.notify_frame_changed(window);
        log::debug!("win32: forcing relayout of {window} after monitor change");
        host.set_size(host.size());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(x: i16, y: i16) -> isize {
        ((y as u16 as isize) << 16) | x as u16 as isize
    }

    #[test]
    fn lparam_points_are_signed() {
        assert_eq!(point_from_lparam(pack(-8, 1030)), Point::new(-8, 1030));
        assert_eq!(point_from_lparam(pack(1920, -1)), Point::new(1920, -1));
    }

    #[test]
    fn hit_test_and_non_client_mouse_decoding() {
        assert_eq!(
            decode_message(msg::WM_NCHITTEST, 0, pack(10, 20)),
            NativeMessage::HitTest {
                global: Point::new(10, 20)
            }
        );
        assert_eq!(
            decode_message(msg::WM_NCLBUTTONUP, 20, pack(780, 5)),
            NativeMessage::NonClientPointer {
                event: PointerEvent::Release(MouseButton::Left),
                hit_code: 20,
                global: Point::new(780, 5),
            }
        );
        assert!(matches!(
            decode_message(msg::WM_NCMOUSELEAVE, 0, 0),
            NativeMessage::NonClientPointer {
                event: PointerEvent::Leave,
                ..
            }
        ));
    }

    #[test]
    fn dpi_and_keyboard_menu_decoding() {
        assert_eq!(
            decode_message(msg::WM_DPICHANGED, (144 << 16) | 144, 0),
            NativeMessage::DpiChanged { dpi: Dpi::uniform(144) }
        );
        assert_eq!(
            decode_message(msg::WM_SYSCOMMAND, msg::SC_KEYMENU as usize, b' ' as isize),
            NativeMessage::KeyboardMenu
        );
        // Alt alone opens the menu bar, not the system menu.
        assert_eq!(
            decode_message(msg::WM_SYSCOMMAND, msg::SC_KEYMENU as usize, 0),
            NativeMessage::Other
        );
    }

    #[test]
    fn lifecycle_and_theme_decoding() {
        assert_eq!(decode_message(msg::WM_NCDESTROY, 0, 0), NativeMessage::Destroy);
        assert_eq!(decode_message(msg::WM_DWMCOLORIZATIONCOLORCHANGED, 0, 0), NativeMessage::ThemeChanged);
        assert_eq!(decode_message(msg::WM_NCACTIVATE, 1, 0), NativeMessage::Activate { active: true });
        assert_eq!(decode_message(0x0400, 0, 0), NativeMessage::Other);
    }
}
