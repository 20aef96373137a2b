/*
 * Platform backends.
 *
 * A backend is the thin adapter between the platform-neutral interceptor and
 * one windowing system: it installs the message hook, decodes native messages,
 * and performs the handful of OS calls the chrome needs (frame margins, DWM
 * attributes, system menu, window-manager driven moves). Exactly one backend
 * is selected per `ChromeContext`.
 *
 * Most operations have a default that reports the feature as unavailable, so
 * a backend only implements what its platform offers.
 */

use crate::config::{ChromeConfig, ChromeOptions};
use crate::error::{ChromeError, Result};
use crate::geometry::{MetricSource, SystemMetric};
use crate::host::HostWindow;
use crate::interceptor::MessageRouter;
use crate::menu::SystemMenuRequest;
use crate::registry::HookGuard;
use crate::sysapi::CapabilityLoader;
use crate::types::{Dpi, Margins, Point, Rect, ResizeEdges, Size, WindowHandle};
use crate::version::FeatureSet;

use std::sync::{Arc, Weak};

pub mod fallback;
#[cfg(target_os = "windows")]
pub mod win32;
#[cfg(target_os = "linux")]
pub mod x11;

pub use fallback::FallbackBackend;

/// A hook installation: the replaced procedure's address (0 if none) and the guard that undoes it.
pub struct InstalledHook {
    pub original_proc: usize,
    pub guard: HookGuard,
}

pub trait PlatformBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when the backend answers the OS's own non-client messages, so the
    /// host window keeps its native frame style and no toolkit frameless flag is needed.
    fn intercepts_native_messages(&self) -> bool {
        false
    }

    fn install_hook(&self, window: WindowHandle, router: Weak<dyn MessageRouter>) -> Result<InstalledHook>;

    /// Starts delivering OS theme-change signals to `router` as `ThemeChanged`,
    /// for backends that receive them outside any host window.
    fn watch_theme_changes(&self, _router: Weak<dyn MessageRouter>) {}

    /// Per-window DPI straight from the OS, where it can be queried.
    fn window_dpi(&self, _window: WindowHandle) -> Option<Dpi> {
        None
    }

    fn primary_screen_dpi(&self) -> Option<Dpi> {
        None
    }

    fn system_metric(&self, _metric: SystemMetric, _dpi: u32) -> Option<i32> {
        None
    }

    /// Work area of the monitor the window is on.
    fn work_area(&self, _window: WindowHandle) -> Option<Rect> {
        None
    }

    /// Monitor edges with an auto-hide taskbar next to the window's monitor.
    fn auto_hide_taskbar_edges(&self, _window: WindowHandle) -> ResizeEdges {
        ResizeEdges::empty()
    }

    /// Whether desktop composition draws the window shadow and frame.
    fn composition_enabled(&self) -> bool {
        false
    }

    /// Requests a leave notification for the pointer leaving `window`. Returns
    /// true when a notification is now pending.
    fn track_mouse_leave(&self, _window: WindowHandle, _non_client: bool) -> bool {
        false
    }

    fn update_frame_margins(&self, _window: WindowHandle, _margins: Margins) -> Result<()> {
        Err(ChromeError::FeatureUnavailable("frame margins".into()))
    }

    /// Makes the OS re-run client rectangle negotiation.
    fn notify_frame_changed(&self, _window: WindowHandle) {}

    fn show_system_menu(&self, _window: WindowHandle, host: &dyn HostWindow, request: &SystemMenuRequest) -> Result<()> {
        host.show_system_menu(request.anchor);
        Ok(())
    }

    fn set_dark_title_bar(&self, _window: WindowHandle, _dark: bool, _attribute: u32) -> Result<()> {
        Err(ChromeError::FeatureUnavailable("dark title bar".into()))
    }

    fn set_round_corners(&self, _window: WindowHandle, _round: bool) -> Result<()> {
        Err(ChromeError::FeatureUnavailable("round corners".into()))
    }

    fn set_backdrop(&self, _window: WindowHandle, _enabled: bool) -> Result<()> {
        Err(ChromeError::FeatureUnavailable("backdrop".into()))
    }

    fn create_snap_helper(&self, _window: WindowHandle, _router: Weak<dyn MessageRouter>) -> Result<WindowHandle> {
        Err(ChromeError::FeatureUnavailable("snap layout".into()))
    }

    fn resize_snap_helper(&self, _helper: WindowHandle, _size: Size) {}

    fn destroy_snap_helper(&self, _helper: WindowHandle) {}

    /// Starts a window-manager driven move. False means the engine has to move the window itself.
    fn start_system_move(&self, _window: WindowHandle, host: &dyn HostWindow, global: Point) -> bool {
        host.start_system_move(global)
    }

    fn start_system_resize(&self, _window: WindowHandle, host: &dyn HostWindow, edges: ResizeEdges, global: Point) -> bool {
        host.start_system_resize(edges, global)
    }

    /*
     * Workaround for toolkits that keep painting with the old monitor's
     * metrics after a window crosses monitors: resizing the window to its own
     * size forces a relayout. Check whether a host toolkit still needs this
     * before relying on it.
     */
    fn migrate_to_monitor(&self, window: WindowHandle, host: &dyn HostWindow) {
        log::debug!("{}: forcing relayout of {window} after monitor change", self.name());
        host.set_size(host.size());
    }
}

/// `MetricSource` view of a backend.
pub struct BackendMetrics<'a>(pub &'a dyn PlatformBackend);

impl MetricSource for BackendMetrics<'_> {
    fn system_metric(&self, metric: SystemMetric, dpi: u32) -> Option<i32> {
        self.0.system_metric(metric, dpi)
    }
}

/*
 * Picks the backend for this process. The cross-platform fallback is used when
 * requested (and not vetoed) or when the native backend cannot start.
 */
pub fn select(config: &ChromeConfig, features: FeatureSet, loader: Arc<CapabilityLoader>) -> Arc<dyn PlatformBackend> {
    let disable_fallback = config.is_set(ChromeOptions::DISABLE_CROSS_PLATFORM_FALLBACK);
    let use_fallback = config.is_set(ChromeOptions::USE_CROSS_PLATFORM_FALLBACK);
    if use_fallback && disable_fallback {
        log::warn!("Backend: fallback both requested and disabled; using the native backend");
    }
    if use_fallback && !disable_fallback {
        log::debug!("Backend: using the cross-platform fallback on request");
        return Arc::new(FallbackBackend::new());
    }
    native(features, loader, disable_fallback)
}

#[cfg(target_os = "windows")]
fn native(features: FeatureSet, loader: Arc<CapabilityLoader>, _disable_fallback: bool) -> Arc<dyn PlatformBackend> {
    Arc::new(win32::Win32Backend::new(features, loader))
}

#[cfg(target_os = "linux")]
fn native(_features: FeatureSet, _loader: Arc<CapabilityLoader>, disable_fallback: bool) -> Arc<dyn PlatformBackend> {
    match x11::X11Backend::connect() {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            if disable_fallback {
                log::error!("Backend: X11 backend unavailable ({err}); fallback is disabled but nothing else can run");
            } else {
                log::warn!("Backend: X11 backend unavailable ({err}); using the cross-platform fallback");
            }
            Arc::new(FallbackBackend::new())
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn native(_features: FeatureSet, _loader: Arc<CapabilityLoader>, _disable_fallback: bool) -> Arc<dyn PlatformBackend> {
    Arc::new(FallbackBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::OsFamily;

    struct NoSymbols;

    impl crate::sysapi::SymbolLoader for NoSymbols {
        fn load(&self, _library: &str, _symbol: crate::sysapi::Symbol<'_>) -> Option<usize> {
            None
        }
    }

    fn config(env: &'static [(&'static str, &'static str)]) -> ChromeConfig {
        ChromeConfig::from_sources(
            |name| env.iter().find(|(key, _)| *key == name).map(|(_, value)| value.to_string()),
            None,
        )
        .unwrap()
    }

    #[test]
    fn fallback_is_used_on_request() {
        let config = config(&[("FRAMELESS_CHROME_USE_FALLBACK", "1")]);
        let loader = Arc::new(CapabilityLoader::new(Box::new(NoSymbols)));

        let backend = select(&config, FeatureSet::new(OsFamily::Other), loader);

        assert_eq!(backend.name(), "fallback");
        assert!(!backend.intercepts_native_messages());
    }

    #[test]
    fn default_operations_degrade() {
        let backend = FallbackBackend::new();
        let err = backend.update_frame_margins(WindowHandle(1), Margins::ZERO).unwrap_err();
        assert!(err.is_feature_unavailable());
        assert!(backend.create_snap_helper(WindowHandle(1), Weak::<crate::testing::NullRouter>::new()).is_err());
        assert!(!backend.track_mouse_leave(WindowHandle(1), true));
    }

    #[test]
    fn default_menu_goes_to_the_host() {
        let host = crate::testing::MockHost::new(WindowHandle(7));
        let backend = FallbackBackend::new();
        let request = SystemMenuRequest::new(
            crate::menu::MenuTrigger::Pointer(Point::new(40, 12)),
            Point::new(0, 0),
            31,
            crate::types::WindowState::Normal,
            false,
        );

        backend.show_system_menu(WindowHandle(7), &host, &request).unwrap();

        assert_eq!(host.menus_shown(), vec![Point::new(40, 12)]);
    }
}
