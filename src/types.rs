/*
 * Platform-agnostic value types shared by every layer of the chrome engine.
 * Nothing in here touches the OS: window handles are opaque integers, geometry
 * is plain integer pixels, and the enums describe the semantic vocabulary the
 * hit-tester, the interceptor and the theme observer speak in.
 */

use bitflags::bitflags;
use std::fmt;
use std::path::PathBuf;

/*
 * Opaque identifier of a native top-level window (an `HWND` value on Windows,
 * an XID on X11). The core never dereferences it; it is a map key and an
 * argument for backend calls only.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WindowHandle(pub usize);

impl WindowHandle {
    pub const NULL: WindowHandle = WindowHandle(0);

    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/*
 * Edge-based rectangle in the same convention as Win32 `RECT`: `right` and
 * `bottom` are exclusive.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_origin_size(origin: Point, size: Size) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + size.width,
            bottom: origin.y + size.height,
        }
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub const fn origin(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub const fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub const fn contains(&self, point: Point) -> bool {
        point.x >= self.left && point.x < self.right && point.y >= self.top && point.y < self.bottom
    }

    pub const fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Margins {
    pub const ZERO: Margins = Margins::uniform(0);

    pub const fn uniform(value: i32) -> Self {
        Self {
            left: value,
            top: value,
            right: value,
            bottom: value,
        }
    }
}

/// Per-axis dots-per-inch of the monitor a window currently lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dpi {
    pub x: u32,
    pub y: u32,
}

impl Dpi {
    /// The 100% scale reference every metric is defined against.
    pub const BASE: u32 = 96;
    pub const DEFAULT: Dpi = Dpi::uniform(Dpi::BASE);

    pub const fn uniform(value: u32) -> Self {
        Self { x: value, y: value }
    }

    pub fn scale_factor(&self) -> f64 {
        f64::from(self.y) / f64::from(Self::BASE)
    }

    pub const fn is_valid(&self) -> bool {
        self.x > 0 && self.y > 0
    }
}

impl Default for Dpi {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
    FullScreen,
}

impl WindowState {
    pub const fn is_maximized(self) -> bool {
        matches!(self, WindowState::Maximized)
    }

    pub const fn is_full_screen(self) -> bool {
        matches!(self, WindowState::FullScreen)
    }

    /// Maximized or full-screen: the window is pinned to the monitor and has no resize border.
    pub const fn fills_monitor(self) -> bool {
        matches!(self, WindowState::Maximized | WindowState::FullScreen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemButtonType {
    WindowIcon,
    Help,
    Minimize,
    Maximize,
    Restore,
    Close,
}

impl SystemButtonType {
    pub const ALL: [SystemButtonType; 6] = [
        SystemButtonType::WindowIcon,
        SystemButtonType::Help,
        SystemButtonType::Minimize,
        SystemButtonType::Maximize,
        SystemButtonType::Restore,
        SystemButtonType::Close,
    ];
}

/*
 * Visual/interaction state the engine asks the host to show on one of its
 * synthetic caption buttons. `Released` is the click: the host performs the
 * button's action when it sees it.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonState {
    #[default]
    Normal,
    Hovered,
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorShape {
    #[default]
    Arrow,
    SizeHorizontal,
    SizeVertical,
    SizeForwardDiagonal,
    SizeBackwardDiagonal,
}

/// Which widget system the host window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolkitFlavor {
    #[default]
    Widgets,
    Declarative,
    Hybrid,
    Native,
}

bitflags! {
    /// Set of window sides; corners are the union of two adjacent sides.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResizeEdges: u8 {
        const LEFT = 0b0001;
        const TOP = 0b0010;
        const RIGHT = 0b0100;
        const BOTTOM = 0b1000;
    }
}

impl ResizeEdges {
    pub const TOP_LEFT: ResizeEdges = ResizeEdges::TOP.union(ResizeEdges::LEFT);
    pub const TOP_RIGHT: ResizeEdges = ResizeEdges::TOP.union(ResizeEdges::RIGHT);
    pub const BOTTOM_LEFT: ResizeEdges = ResizeEdges::BOTTOM.union(ResizeEdges::LEFT);
    pub const BOTTOM_RIGHT: ResizeEdges = ResizeEdges::BOTTOM.union(ResizeEdges::RIGHT);

    pub fn cursor_shape(self) -> CursorShape {
        if self == Self::TOP_LEFT || self == Self::BOTTOM_RIGHT {
            CursorShape::SizeForwardDiagonal
        } else if self == Self::TOP_RIGHT || self == Self::BOTTOM_LEFT {
            CursorShape::SizeBackwardDiagonal
        } else if self == Self::LEFT || self == Self::RIGHT {
            CursorShape::SizeHorizontal
        } else if self == Self::TOP || self == Self::BOTTOM {
            CursorShape::SizeVertical
        } else {
            CursorShape::Arrow
        }
    }
}

bitflags! {
    /// Host-level window flags the engine reads and toggles.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowFlags: u32 {
        const FRAMELESS = 1 << 0;
        const TITLE = 1 << 1;
        const SYSTEM_MENU = 1 << 2;
        const MINIMIZE_BUTTON = 1 << 3;
        const MAXIMIZE_BUTTON = 1 << 4;
        const CLOSE_BUTTON = 1 << 5;
        const STAYS_ON_TOP = 1 << 6;
    }
}

/// Semantic classification of a window-local point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitTestResult {
    ResizeEdges(ResizeEdges),
    SystemButton(SystemButtonType),
    CaptionDraggable,
    ClientContent,
    Transparent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SystemTheme {
    #[default]
    Unknown,
    Light,
    Dark,
    HighContrast,
}

/// Chrome regions the OS paints with the accent color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorizationArea {
    #[default]
    None,
    StartMenuTaskbarActionCenter,
    TitleBarWindowBorder,
    All,
}

impl ColorizationArea {
    pub fn from_flags(taskbar: bool, title_bar: bool) -> Self {
        match (taskbar, title_bar) {
            (true, true) => ColorizationArea::All,
            (true, false) => ColorizationArea::StartMenuTaskbarActionCenter,
            (false, true) => ColorizationArea::TitleBarWindowBorder,
            (false, false) => ColorizationArea::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WallpaperAspectStyle {
    #[default]
    Fill,
    Fit,
    Stretch,
    Tile,
    Center,
    Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Decodes a `0xAARRGGBB` value (the layout DWM reports colorization colors in).
    pub const fn from_argb(value: u32) -> Self {
        Self {
            a: (value >> 24) as u8,
            r: (value >> 16) as u8,
            g: (value >> 8) as u8,
            b: value as u8,
        }
    }

    /// Decodes a `0x00BBGGRR` COLORREF-style value.
    pub const fn from_abgr(value: u32) -> Self {
        Self {
            a: (value >> 24) as u8,
            b: (value >> 16) as u8,
            g: (value >> 8) as u8,
            r: value as u8,
        }
    }
}

/*
 * One observation of the desktop's appearance. Recomputed wholesale on every
 * theme/wallpaper notification and compared field by field with the previous
 * one, so every field takes part in equality.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThemeSnapshot {
    pub theme: SystemTheme,
    pub accent_color: Color,
    pub colorization_area: ColorizationArea,
    pub wallpaper: Option<PathBuf>,
    pub wallpaper_aspect_style: WallpaperAspectStyle,
}
