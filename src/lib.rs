/*
 * Frameless window chrome for host GUI toolkits.
 *
 * A host removes its window's native title bar and border, then registers the
 * window with `FramelessManager`. From then on the crate makes the window
 * behave like a natively framed one: resize borders and caption dragging,
 * caption button hover/press/click, the system menu, Aero Snap and the
 * Windows 11 snap layout flyout, DPI changes, and theme tracking.
 *
 * On Windows the crate subclasses the window procedure and answers the OS's
 * non-client messages itself. Elsewhere (and on request) it runs the
 * cross-platform fallback, where the host forwards its pointer events through
 * `FramelessManager::dispatch`. The platform-neutral core (hit-testing,
 * geometry, the per-window registry, the interceptor) builds and tests on
 * every platform.
 */
pub mod backend;
pub mod config;
pub mod error;
pub mod geometry;
pub mod hittest;
pub mod host;
pub mod interceptor;
pub mod manager;
pub mod menu;
pub mod registry;
pub mod sysapi;
pub mod theme;
pub mod types;
pub mod version;

#[cfg(test)]
mod testing;

pub use backend::PlatformBackend;
pub use config::{ChromeConfig, ChromeOptions};
pub use error::{ChromeError, Result as ChromeResult};
pub use host::{HostWindow, SystemParameters};
pub use interceptor::{NativeMessage, PointerEvent};
pub use manager::{ChromeContext, FramelessManager};
pub use theme::{SubscriptionId, ThemeCallback};
pub use types::{
    ButtonState, Color, ColorizationArea, CursorShape, Dpi, HitTestResult, Margins, MouseButton, Point, Rect,
    ResizeEdges, Size, SystemButtonType, SystemTheme, ThemeSnapshot, ToolkitFlavor, WallpaperAspectStyle,
    WindowFlags, WindowHandle, WindowState,
};
