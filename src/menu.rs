/*
 * The window (system) menu shown for right clicks on the caption, clicks on the
 * window icon and the Alt+Space chord.
 */

use crate::types::{Point, WindowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemMenuItem {
    Restore,
    Move,
    Size,
    Minimize,
    Maximize,
    Close,
}

impl SystemMenuItem {
    pub const ALL: [SystemMenuItem; 6] = [
        SystemMenuItem::Restore,
        SystemMenuItem::Move,
        SystemMenuItem::Size,
        SystemMenuItem::Minimize,
        SystemMenuItem::Maximize,
        SystemMenuItem::Close,
    ];
}

/// How the menu was requested; decides where it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuTrigger {
    /// Pointer click at a screen position.
    Pointer(Point),
    Keyboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MenuState {
    pub restore: bool,
    pub move_: bool,
    pub size: bool,
    pub minimize: bool,
    pub maximize: bool,
    pub close: bool,
}

impl MenuState {
    pub fn for_window(state: WindowState, fixed_size: bool) -> Self {
        let maximized = state.is_maximized();
        let full_screen = state.is_full_screen();
        Self {
            restore: (maximized || full_screen) && !fixed_size,
            move_: !maximized && !full_screen,
            size: !maximized && !fixed_size && !full_screen,
            minimize: true,
            maximize: !maximized && !fixed_size,
            close: true,
        }
    }

    pub fn is_enabled(&self, item: SystemMenuItem) -> bool {
        match item {
            SystemMenuItem::Restore => self.restore,
            SystemMenuItem::Move => self.move_,
            SystemMenuItem::Size => self.size,
            SystemMenuItem::Minimize => self.minimize,
            SystemMenuItem::Maximize => self.maximize,
            SystemMenuItem::Close => self.close,
        }
    }
}

/// Everything a backend needs to pop the menu up. The menu never gets a default item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemMenuRequest {
    pub anchor: Point,
    pub items: MenuState,
}

impl SystemMenuRequest {
    pub fn new(
        trigger: MenuTrigger,
        window_origin: Point,
        title_bar_height: i32,
        state: WindowState,
        fixed_size: bool,
    ) -> Self {
        let anchor = match trigger {
            MenuTrigger::Pointer(global) => global,
            MenuTrigger::Keyboard => {
                crate::geometry::keyboard_menu_anchor(window_origin, title_bar_height)
            }
        };
        Self {
            anchor,
            items: MenuState::for_window(state, fixed_size),
        }
    }
}
