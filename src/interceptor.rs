/*
 * Native message interceptor.
 *
 * Backends decode their platform's window messages into `NativeMessage`, hand
 * them to a `MessageRouter` together with a `DefaultHandler` that can run the
 * previously installed procedure, and translate the returned `Outcome` back
 * into whatever the platform expects. The decisions themselves are made here,
 * once, for every backend.
 *
 * Every message this module does not explicitly answer is delegated. Toolkits
 * rely on seeing their own messages, so `Outcome::Delegate` is the default
 * answer of every branch that has nothing to add.
 */

use crate::hittest::{self, NativeHitCode};
use crate::host::HostWindow;
use crate::manager::ChromeContext;
use crate::menu::MenuTrigger;
use crate::registry::PerWindowState;
use crate::types::{
    ButtonState, CursorShape, Dpi, HitTestResult, MouseButton, Point, Rect, SystemButtonType,
    WindowHandle, WindowState,
};

use crate::geometry::{ClientAreaRequest, DragKind, DragSession};

/// Two caption clicks closer than this (in time and in pixels) maximize/restore.
pub const DOUBLE_CLICK_INTERVAL_MS: u64 = 500;
pub const DOUBLE_CLICK_DISTANCE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Move,
    Press(MouseButton),
    DoubleClick(MouseButton),
    Release(MouseButton),
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeMessage {
    /// Client rectangle negotiation for a proposed window rectangle (`WM_NCCALCSIZE`).
    CalcClientRect { proposed: Rect },
    /// `WM_NCHITTEST`; the point is in screen coordinates.
    HitTest { global: Point },
    /// Mouse activity the OS attributes to a non-client hit code.
    NonClientPointer {
        event: PointerEvent,
        hit_code: i32,
        global: Point,
    },
    /// Mouse activity in the client area, for backends without native hit-testing.
    Pointer {
        event: PointerEvent,
        global: Point,
        timestamp_ms: u64,
    },
    Activate { active: bool },
    NonClientPaint,
    /// Title or icon update; the OS repaints its caption in response.
    SetTextOrIcon,
    DpiChanged { dpi: Dpi },
    /// Size or state change, after the toolkit has seen it.
    SizeChanged,
    /// Alt+Space.
    KeyboardMenu,
    ThemeChanged,
    MonitorChanged,
    Destroy,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The message is answered; the value goes back to the OS.
    Return(isize),
    /// `CalcClientRect` answer: the backend writes `rect` back, then returns `result`.
    ClientRect { rect: Rect, result: isize },
    /// Run the previously installed procedure and return its result.
    Delegate,
}

/// Access to the message procedure that was active before the hook.
pub trait DefaultHandler {
    fn forward(&mut self) -> isize;

    /// Forwards while the window's visible style is cleared, so the OS skips
    /// painting its own caption.
    fn forward_suppressing_paint(&mut self) -> isize {
        self.forward()
    }

    /// Forwards a `CalcClientRect` and reports the rectangle the default procedure produced.
    fn forward_calc_size(&mut self) -> Option<Rect> {
        None
    }
}

/// Default handler for messages that did not come from a native procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefault;

impl DefaultHandler for NoDefault {
    fn forward(&mut self) -> isize {
        0
    }
}

pub trait MessageRouter: Send + Sync {
    fn route(&self, window: WindowHandle, message: NativeMessage, default: &mut dyn DefaultHandler) -> Outcome;
}

/*
 * The registered window `window` belongs to: itself, or the owner of the snap
 * helper overlay it is.
 */
fn resolve_owner(ctx: &ChromeContext, window: WindowHandle) -> Option<(WindowHandle, PerWindowState, bool)> {
    let registry = ctx.registry();
    if let Some(state) = registry.lookup(window) {
        return Some((window, state, false));
    }
    let owner = registry.owner_of_helper(window)?;
    registry.lookup(owner).map(|state| (owner, state, true))
}

pub(crate) fn handle_message(
    ctx: &ChromeContext,
    window: WindowHandle,
    message: NativeMessage,
    default: &mut dyn DefaultHandler,
) -> Outcome {
    // Theme signals arrive on top-level or root windows the registry never sees.
    if message == NativeMessage::ThemeChanged {
        log::trace!("Interceptor: theme change signalled through {window}");
        ctx.refresh_theme();
        return Outcome::Delegate;
    }
    let Some((owner, state, over_helper)) = resolve_owner(ctx, window) else {
        return Outcome::Delegate;
    };
    log::trace!("Interceptor: {window} {message:?}");

    match message {
        NativeMessage::CalcClientRect { proposed } if !over_helper => {
            calc_client_rect(ctx, owner, &state, proposed, default)
        }
        NativeMessage::HitTest { global } => hit_test(ctx, &state, global, over_helper, default),
        NativeMessage::NonClientPointer {
            event,
            hit_code,
            global,
        } => non_client_pointer(ctx, owner, window, &state, event, hit_code, global),
        NativeMessage::Pointer {
            event,
            global,
            timestamp_ms,
        } if !over_helper => client_pointer(ctx, owner, &state, event, global, timestamp_ms),
        NativeMessage::Activate { .. } if !over_helper => {
            if ctx.frame_border_visible() {
                Outcome::Delegate
            } else {
                Outcome::Return(1)
            }
        }
        NativeMessage::NonClientPaint if !over_helper => {
            if ctx.frame_border_visible() || ctx.backend().composition_enabled() {
                Outcome::Delegate
            } else {
                Outcome::Return(0)
            }
        }
        NativeMessage::SetTextOrIcon if !over_helper => {
            if ctx.frame_border_visible() || ctx.backend().composition_enabled() {
                Outcome::Delegate
            } else {
                Outcome::Return(default.forward_suppressing_paint())
            }
        }
        NativeMessage::DpiChanged { dpi } if !over_helper => {
            ctx.registry().update(owner, |s| s.dpi = dpi);
            log::debug!("Interceptor: {owner} moved to {} dpi", dpi.y);
            let result = default.forward();
            ctx.refresh_window_chrome(owner, &*state.params);
            Outcome::Return(result)
        }
        NativeMessage::SizeChanged if !over_helper => {
            let result = default.forward();
            ctx.refresh_window_chrome(owner, &*state.params);
            Outcome::Return(result)
        }
        NativeMessage::KeyboardMenu if !over_helper => {
            ctx.show_system_menu(owner, &*state.params, MenuTrigger::Keyboard);
            Outcome::Return(0)
        }
        NativeMessage::MonitorChanged if !over_helper => {
            ctx.backend().migrate_to_monitor(owner, &*state.params);
            Outcome::Delegate
        }
        NativeMessage::Destroy if !over_helper => {
            log::debug!("Interceptor: {owner} is being destroyed");
            ctx.remove_window(owner);
            Outcome::Delegate
        }
        _ => Outcome::Delegate,
    }
}

fn calc_client_rect(
    ctx: &ChromeContext,
    window: WindowHandle,
    state: &PerWindowState,
    proposed: Rect,
    default: &mut dyn DefaultHandler,
) -> Outcome {
    let frame_border_visible = ctx.frame_border_visible();
    let os_default = if frame_border_visible {
        default.forward_calc_size()
    } else {
        None
    };
    let window_state = state.params.window_state();
    let auto_hide_taskbar = if window_state.fills_monitor() {
        ctx.backend().auto_hide_taskbar_edges(window)
    } else {
        Default::default()
    };
    let rect = crate::geometry::adjust_client_rect(&ClientAreaRequest {
        proposed,
        os_default,
        state: window_state,
        frame_border_visible,
        resize_border: ctx.metrics(state.dpi).resize_border,
        auto_hide_taskbar,
    });
    log::trace!("Interceptor: client rect of {window} is {rect:?}");
    Outcome::ClientRect { rect, result: 0 }
}

fn hit_test(
    ctx: &ChromeContext,
    state: &PerWindowState,
    global: Point,
    over_helper: bool,
    default: &mut dyn DefaultHandler,
) -> Outcome {
    let frame_border_visible = ctx.frame_border_visible();
    if frame_border_visible && !over_helper {
        // The OS still owns the left, right and bottom borders outside the client area.
        let native = default.forward();
        if native != NativeHitCode::Client.value() as isize {
            return Outcome::Return(native);
        }
    }

    let host = &*state.params;
    let local = host.map_from_global(global);
    let thickness = ctx.metrics(state.dpi).resize_border;
    let mut result = hittest::classify(local, host, thickness);
    if frame_border_visible {
        if let HitTestResult::ResizeEdges(edges) = result {
            result = if edges.contains(crate::types::ResizeEdges::TOP) {
                HitTestResult::ResizeEdges(crate::types::ResizeEdges::TOP)
            } else {
                HitTestResult::ClientContent
            };
        }
    }
    if over_helper {
        result = hittest::classify_over_snap_helper(result);
    }
    log::trace!("Interceptor: hit-test {local:?} -> {result:?}");
    Outcome::Return(NativeHitCode::from_hit_result(result).value() as isize)
}

fn non_client_pointer(
    ctx: &ChromeContext,
    owner: WindowHandle,
    target: WindowHandle,
    state: &PerWindowState,
    event: PointerEvent,
    hit_code: i32,
    global: Point,
) -> Outcome {
    let host = &*state.params;
    let maximized = host.window_state().is_maximized();
    let button = NativeHitCode::system_button(hit_code, maximized);

    match event {
        PointerEvent::Move => {
            ensure_leave_tracking(ctx, owner, target, state);
            hover_button(ctx, owner, host, button);
            if button.is_some() {
                Outcome::Return(0)
            } else {
                Outcome::Delegate
            }
        }
        PointerEvent::Leave => {
            ctx.registry().update(owner, |s| s.tracking_mouse = false);
            leave_buttons(ctx, owner, host);
            Outcome::Delegate
        }
        PointerEvent::Press(MouseButton::Left) | PointerEvent::DoubleClick(MouseButton::Left) => match button {
            Some(SystemButtonType::WindowIcon) => {
                ctx.show_system_menu(owner, host, MenuTrigger::Pointer(global));
                Outcome::Return(0)
            }
            Some(button) => {
                press_button(ctx, owner, host, button);
                Outcome::Return(0)
            }
            None if event == PointerEvent::DoubleClick(MouseButton::Left)
                && hit_code == NativeHitCode::Caption.value()
                && host.is_fixed_size() =>
            {
                Outcome::Return(0)
            }
            None => Outcome::Delegate,
        },
        PointerEvent::Release(MouseButton::Left) => {
            if button.is_some() || state.pressed_button.is_some() {
                release_button(ctx, owner, host, button);
                Outcome::Return(0)
            } else {
                Outcome::Delegate
            }
        }
        PointerEvent::Release(MouseButton::Right)
            if hit_code == NativeHitCode::Caption.value() || button == Some(SystemButtonType::WindowIcon) =>
        {
            ctx.show_system_menu(owner, host, MenuTrigger::Pointer(global));
            Outcome::Return(0)
        }
        _ => {
            if button.is_some() {
                Outcome::Return(0)
            } else {
                Outcome::Delegate
            }
        }
    }
}

fn client_pointer(
    ctx: &ChromeContext,
    window: WindowHandle,
    state: &PerWindowState,
    event: PointerEvent,
    global: Point,
    timestamp_ms: u64,
) -> Outcome {
    let host = &*state.params;
    match event {
        PointerEvent::Move => {
            if let Some(session) = state.drag {
                let minimum = ctx.metrics(state.dpi).minimum_window_size(state.dpi);
                let frame = session.frame_at(global, minimum);
                host.set_position(frame.origin());
                if matches!(session.kind, DragKind::Resize(_)) {
                    host.set_size(frame.size());
                }
                return Outcome::Return(1);
            }
            let result = classify_client(ctx, state, global);
            let cursor = match result {
                HitTestResult::ResizeEdges(edges) => edges.cursor_shape(),
                _ => CursorShape::Arrow,
            };
            host.set_cursor_shape(cursor);
            let button = match result {
                HitTestResult::SystemButton(button) => Some(button),
                _ => None,
            };
            hover_button(ctx, window, host, button);
            Outcome::Delegate
        }
        PointerEvent::Leave => {
            leave_buttons(ctx, window, host);
            Outcome::Delegate
        }
        PointerEvent::Press(MouseButton::Left) | PointerEvent::DoubleClick(MouseButton::Left) => {
            match classify_client(ctx, state, global) {
                HitTestResult::SystemButton(SystemButtonType::WindowIcon) => {
                    ctx.show_system_menu(window, host, MenuTrigger::Pointer(global));
                    Outcome::Return(1)
                }
                HitTestResult::SystemButton(button) => {
                    press_button(ctx, window, host, button);
                    Outcome::Return(1)
                }
                HitTestResult::CaptionDraggable => {
                    let double_click = event == PointerEvent::DoubleClick(MouseButton::Left)
                        || register_caption_click(ctx, window, global, timestamp_ms);
                    if double_click {
                        toggle_maximized(host);
                    } else if !ctx.backend().start_system_move(window, host, global) {
                        begin_drag(ctx, window, host, DragKind::Move, global);
                    }
                    Outcome::Return(1)
                }
                HitTestResult::ResizeEdges(edges) => {
                    if !ctx.backend().start_system_resize(window, host, edges, global) {
                        begin_drag(ctx, window, host, DragKind::Resize(edges), global);
                    }
                    Outcome::Return(1)
                }
                HitTestResult::ClientContent | HitTestResult::Transparent => Outcome::Delegate,
            }
        }
        PointerEvent::Press(MouseButton::Right) => match classify_client(ctx, state, global) {
            HitTestResult::CaptionDraggable | HitTestResult::SystemButton(SystemButtonType::WindowIcon) => {
                ctx.show_system_menu(window, host, MenuTrigger::Pointer(global));
                Outcome::Return(1)
            }
            _ => Outcome::Delegate,
        },
        PointerEvent::Release(MouseButton::Left) => {
            if state.drag.is_some() {
                ctx.registry().update(window, |s| s.drag = None);
                return Outcome::Return(1);
            }
            if state.pressed_button.is_none() {
                return Outcome::Delegate;
            }
            let over = match classify_client(ctx, state, global) {
                HitTestResult::SystemButton(button) => Some(button),
                _ => None,
            };
            release_button(ctx, window, host, over);
            Outcome::Return(1)
        }
        _ => Outcome::Delegate,
    }
}

fn classify_client(ctx: &ChromeContext, state: &PerWindowState, global: Point) -> HitTestResult {
    let host = &*state.params;
    let local = host.map_from_global(global);
    hittest::classify(local, host, ctx.metrics(state.dpi).resize_border)
}

fn toggle_maximized(host: &dyn HostWindow) {
    if host.is_fixed_size() {
        return;
    }
    let next = match host.window_state() {
        WindowState::Maximized => WindowState::Normal,
        WindowState::FullScreen => return,
        WindowState::Normal | WindowState::Minimized => WindowState::Maximized,
    };
    host.set_window_state(next);
}

/// Records a caption press; returns true when it completes a double click.
fn register_caption_click(ctx: &ChromeContext, window: WindowHandle, global: Point, timestamp_ms: u64) -> bool {
    ctx.registry()
        .update(window, |s| {
            let double = s.last_caption_click.is_some_and(|(time, position)| {
                timestamp_ms.saturating_sub(time) <= DOUBLE_CLICK_INTERVAL_MS
                    && (global.x - position.x).abs() <= DOUBLE_CLICK_DISTANCE
                    && (global.y - position.y).abs() <= DOUBLE_CLICK_DISTANCE
            });
            s.last_caption_click = if double { None } else { Some((timestamp_ms, global)) };
            double
        })
        .unwrap_or(false)
}

fn begin_drag(
    ctx: &ChromeContext,
    window: WindowHandle,
    host: &dyn HostWindow,
    kind: DragKind,
    global: Point,
) {
    let frame = Rect::from_origin_size(host.position(), host.size());
    let session = DragSession::new(kind, global, frame);
    log::debug!("Interceptor: manual {kind:?} of {window}");
    ctx.registry().update(window, |s| s.drag = Some(session));
}

fn ensure_leave_tracking(ctx: &ChromeContext, owner: WindowHandle, target: WindowHandle, state: &PerWindowState) {
    if state.tracking_mouse {
        return;
    }
    if ctx.backend().track_mouse_leave(target, true) {
        ctx.registry().update(owner, |s| s.tracking_mouse = true);
    }
}

/*
 * Button visual state. At most one button is hovered and at most one is
 * pressed, and a press always lands on the hovered button. The registry is
 * updated first; the host is told afterwards, outside the registry lock.
 */
fn hover_button(
    ctx: &ChromeContext,
    window: WindowHandle,
    host: &dyn HostWindow,
    button: Option<SystemButtonType>,
) {
    let Some((previous_hover, previous_press)) = ctx.registry().update(window, |s| {
        let previous = (s.hovered_button, s.pressed_button);
        s.hovered_button = button;
        if s.pressed_button != button {
            s.pressed_button = None;
        }
        previous
    }) else {
        return;
    };

    for old in released_buttons(previous_hover, previous_press, button) {
        host.set_system_button_state(old, ButtonState::Normal);
    }
    if let Some(button) = button {
        if previous_hover != Some(button) && previous_press != Some(button) {
            host.set_system_button_state(button, ButtonState::Hovered);
        }
    }
}

fn press_button(ctx: &ChromeContext, window: WindowHandle, host: &dyn HostWindow, button: SystemButtonType) {
    let Some((previous_hover, previous_press)) = ctx.registry().update(window, |s| {
        let previous = (s.hovered_button, s.pressed_button);
        s.hovered_button = Some(button);
        s.pressed_button = Some(button);
        previous
    }) else {
        return;
    };
    for old in released_buttons(previous_hover, previous_press, Some(button)) {
        host.set_system_button_state(old, ButtonState::Normal);
    }
    host.set_system_button_state(button, ButtonState::Pressed);
}

/*
 * Ends a press. A release over the pressed button is a click: the host gets
 * `Released` and performs the button's action.
 */
fn release_button(
    ctx: &ChromeContext,
    window: WindowHandle,
    host: &dyn HostWindow,
    over: Option<SystemButtonType>,
) {
    let Some((previous_hover, previous_press)) = ctx.registry().update(window, |s| {
        let previous = (s.hovered_button, s.pressed_button);
        s.hovered_button = over;
        s.pressed_button = None;
        previous
    }) else {
        return;
    };

    for old in released_buttons(previous_hover, previous_press, over) {
        host.set_system_button_state(old, ButtonState::Normal);
    }
    match over {
        Some(button) if previous_press == Some(button) => {
            log::debug!("Interceptor: {button:?} clicked on {window}");
            host.set_system_button_state(button, ButtonState::Released);
            host.set_system_button_state(button, ButtonState::Hovered);
        }
        Some(button) if previous_hover != Some(button) => {
            host.set_system_button_state(button, ButtonState::Hovered);
        }
        _ => {}
    }
}

fn leave_buttons(ctx: &ChromeContext, window: WindowHandle, host: &dyn HostWindow) {
    let Some((previous_hover, previous_press)) = ctx.registry().update(window, |s| {
        (s.hovered_button.take(), s.pressed_button.take())
    }) else {
        return;
    };
    for old in released_buttons(previous_hover, previous_press, None) {
        host.set_system_button_state(old, ButtonState::Normal);
    }
}

/// Buttons that were hovered or pressed and are no longer `current`, without duplicates.
fn released_buttons(
    hovered: Option<SystemButtonType>,
    pressed: Option<SystemButtonType>,
    current: Option<SystemButtonType>,
) -> Vec<SystemButtonType> {
    let mut released = Vec::with_capacity(2);
    for button in [hovered, pressed].into_iter().flatten() {
        if Some(button) != current && !released.contains(&button) {
            released.push(button);
        }
    }
    released
}
