/*
 * The facade.
 *
 * `ChromeContext` owns everything one chrome engine needs: configuration,
 * detected OS features, the selected backend, the window registry, the metric
 * table and the theme observer. Contexts are independent of each other, which
 * is what the tests rely on. `FramelessManager` is the process-wide face of a
 * single context, created on first use (or explicitly through `initialize`)
 * and torn down by `uninitialize`.
 *
 * Public facade calls never fail loudly: invalid input and OS failures are
 * logged and reported as `false`. `ChromeContext::try_add_window` exposes the
 * underlying `Result` for callers that want the reason.
 */

use crate::backend::{self, BackendMetrics, PlatformBackend};
use crate::config::{ChromeConfig, ChromeOptions};
use crate::error::{ChromeError, Result};
use crate::geometry::{self, ChromeGeometry, ChromeMetrics};
use crate::host::HostWindow;
use crate::interceptor::{self, DefaultHandler, MessageRouter, NativeMessage, NoDefault, Outcome};
use crate::menu::{MenuTrigger, SystemMenuRequest};
use crate::registry::WindowRegistry;
use crate::sysapi::CapabilityLoader;
use crate::theme::{SubscriptionId, ThemeObserver};
use crate::types::{Color, Dpi, SystemTheme, ThemeSnapshot, ToolkitFlavor, WindowFlags, WindowHandle};
use crate::version::FeatureSet;

use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::{Arc, OnceLock, Weak};

pub struct ChromeContext {
    config: ChromeConfig,
    features: FeatureSet,
    backend: Arc<dyn PlatformBackend>,
    registry: WindowRegistry,
    geometry: ChromeGeometry,
    theme: ThemeObserver,
    /// Features already reported as unavailable; later failures log at debug level.
    degraded: Mutex<HashSet<&'static str>>,
}

impl std::fmt::Debug for ChromeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeContext")
            .field("backend", &self.backend.name())
            .field("features", &self.features)
            .field("windows", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl ChromeContext {
    pub fn new(
        config: ChromeConfig,
        features: FeatureSet,
        backend: Arc<dyn PlatformBackend>,
        theme: ThemeObserver,
    ) -> Arc<Self> {
        log::debug!("ChromeContext: created with the {} backend", backend.name());
        let ctx = Arc::new(Self {
            config,
            features,
            backend,
            registry: WindowRegistry::new(),
            geometry: ChromeGeometry::new(),
            theme,
            degraded: Mutex::new(HashSet::new()),
        });
        let router: Weak<dyn MessageRouter> = Arc::downgrade(&ctx) as Weak<dyn MessageRouter>;
        ctx.backend.watch_theme_changes(router);
        ctx
    }

    /// Context for the running process: detected OS features, the configuration
    /// from the environment and the file beside the executable, and the backend
    /// that configuration selects.
    pub fn system() -> Arc<Self> {
        let loader = Arc::new(CapabilityLoader::system());
        let features = FeatureSet::detect(&loader);
        let config = ChromeConfig::new();
        let backend = backend::select(&config, features, loader);
        Self::new(config, features, backend, ThemeObserver::system())
    }

    pub fn config(&self) -> &ChromeConfig {
        &self.config
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    pub fn backend(&self) -> &dyn PlatformBackend {
        &*self.backend
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn theme(&self) -> &ThemeObserver {
        &self.theme
    }

    pub fn metrics(&self, dpi: Dpi) -> ChromeMetrics {
        self.geometry.metrics(dpi, &BackendMetrics(&*self.backend))
    }

    pub fn frame_border_visible(&self) -> bool {
        self.config.frame_border_visible(self.features.os_draws_frame_border())
    }

    fn backdrop_active(&self) -> bool {
        self.config.is_set(ChromeOptions::ENABLE_BLUR_BEHIND)
    }

    /*
     * Registers `host` and takes over its chrome. `Ok(false)` means the window
     * was already registered and nothing changed. On error nothing about the
     * window has been modified.
     */
    pub fn try_add_window(self: &Arc<Self>, host: Arc<dyn HostWindow>) -> Result<bool> {
        let handle = host.window_id();
        let dpi = geometry::resolve_dpi(
            self.backend.window_dpi(handle),
            host.device_pixel_ratio(),
            self.backend.primary_screen_dpi(),
        );
        if !self.registry.insert(handle, Arc::clone(&host), dpi)? {
            return Ok(false);
        }

        let router: Weak<dyn MessageRouter> = Arc::downgrade(self) as Weak<dyn MessageRouter>;
        let installed = match self.backend.install_hook(handle, router.clone()) {
            Ok(installed) => installed,
            Err(err) => {
                log::error!("ChromeContext: failed to hook {handle}: {err}");
                self.registry.remove(handle);
                return Err(err);
            }
        };
        let guard = Arc::new(installed.guard);
        self.registry.update(handle, |state| {
            state.original_proc = installed.original_proc;
            state.hook = Some(guard);
        });
        log::debug!("ChromeContext: hooked {handle} at {} dpi", dpi.y);

        if !self.backend.intercepts_native_messages() {
            host.set_window_flags(host.window_flags() | WindowFlags::FRAMELESS);
        }
        self.apply_frame_margins(handle, &*host);
        self.backend.notify_frame_changed(handle);
        self.apply_dark_title_bar(handle);

        if self.config.is_set(ChromeOptions::ROUND_CORNERS) && self.features.supports_round_corners() {
            self.report("round corners", self.backend.set_round_corners(handle, true));
        }
        if self.backdrop_active() {
            self.report("backdrop", self.backend.set_backdrop(handle, true));
        }
        self.attach_snap_helper(handle, &*host, router);

        if self.config.is_set(ChromeOptions::CENTER_BEFORE_SHOW) {
            match self.backend.work_area(handle) {
                Some(area) => host.set_position(geometry::center_in_work_area(host.size(), area)),
                None => log::warn!("ChromeContext: no work area for {handle}; not centering"),
            }
        }
        Ok(true)
    }

    fn attach_snap_helper(&self, handle: WindowHandle, host: &dyn HostWindow, router: Weak<dyn MessageRouter>) {
        if !self.features.supports_snap_layout()
            || self.config.is_set(ChromeOptions::DISABLE_SNAP_LAYOUT)
            || host.toolkit_flavor() == ToolkitFlavor::Native
        {
            return;
        }
        match self.backend.create_snap_helper(handle, router) {
            Ok(helper) => {
                self.backend.resize_snap_helper(helper, host.size());
                self.registry.update(handle, |state| state.snap_helper = Some(helper));
                log::debug!("ChromeContext: snap helper {helper} attached to {handle}");
            }
            Err(err) => self.report("snap layout", Err(err)),
        }
    }

    /*
     * Unregisters `handle`: restores the original message procedure, destroys
     * the snap helper, then drops the entry. Returns false if the window was
     * not registered.
     */
    pub fn remove_window(&self, handle: WindowHandle) -> bool {
        let Some(state) = self.registry.lookup(handle) else {
            return false;
        };
        if let Some(hook) = &state.hook {
            hook.release();
        }
        if let Some(helper) = state.snap_helper {
            self.backend.destroy_snap_helper(helper);
        }
        let removed = self.registry.remove(handle).is_some();
        if removed {
            log::debug!("ChromeContext: released {handle}");
        }
        removed
    }

    /// Removes every registered window.
    pub fn shutdown(&self) {
        for handle in self.registry.handles() {
            self.remove_window(handle);
        }
    }

    /// Re-applies everything that depends on the window's state or DPI.
    pub fn refresh_window_chrome(&self, handle: WindowHandle, host: &dyn HostWindow) {
        self.apply_frame_margins(handle, host);
        if let Some(helper) = self.registry.lookup(handle).and_then(|state| state.snap_helper) {
            self.backend.resize_snap_helper(helper, host.size());
        }
    }

    fn apply_frame_margins(&self, handle: WindowHandle, host: &dyn HostWindow) {
        let margins = geometry::frame_margins(host.window_state(), self.backdrop_active());
        self.report("frame margins", self.backend.update_frame_margins(handle, margins));
    }

    fn apply_dark_title_bar(&self, handle: WindowHandle) {
        let Some(attribute) = self.features.dark_mode_attribute() else {
            return;
        };
        let dark = self.theme.is_dark();
        self.report("dark title bar", self.backend.set_dark_title_bar(handle, dark, attribute));
    }

    pub fn show_system_menu(&self, handle: WindowHandle, host: &dyn HostWindow, trigger: MenuTrigger) {
        let dpi = self.registry.lookup(handle).map_or(Dpi::DEFAULT, |state| state.dpi);
        let request = SystemMenuRequest::new(
            trigger,
            host.position(),
            self.metrics(dpi).title_bar_height,
            host.window_state(),
            host.is_fixed_size(),
        );
        log::debug!("ChromeContext: system menu for {handle} at {:?}", request.anchor);
        self.report("system menu", self.backend.show_system_menu(handle, host, &request));
    }

    /// Re-reads the desktop theme; on a change every window's title bar follows it.
    pub fn refresh_theme(&self) -> bool {
        if !self.theme.refresh() {
            return false;
        }
        for handle in self.registry.handles() {
            self.apply_dark_title_bar(handle);
        }
        true
    }

    /*
     * Feeds a host-observed event to the interceptor, for backends whose
     * events arrive through the host toolkit. Returns true if the event was
     * consumed and the host should not process it further.
     */
    pub fn dispatch(&self, handle: WindowHandle, message: NativeMessage) -> bool {
        !matches!(self.route(handle, message, &mut NoDefault), Outcome::Delegate)
    }

    fn report(&self, what: &'static str, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(ChromeError::FeatureUnavailable(detail)) => {
                if self.degraded.lock().insert(what) {
                    log::warn!("ChromeContext: {what} unavailable on {}: {detail}", self.backend.name());
                } else {
                    log::debug!("ChromeContext: {what} still unavailable: {detail}");
                }
            }
            Err(err) => log::error!("ChromeContext: {what} failed: {err}"),
        }
    }
}

impl MessageRouter for ChromeContext {
    fn route(&self, window: WindowHandle, message: NativeMessage, default: &mut dyn DefaultHandler) -> Outcome {
        interceptor::handle_message(self, window, message, default)
    }
}

static INSTANCE: OnceLock<FramelessManager> = OnceLock::new();

#[derive(Debug, Default)]
pub struct FramelessManager {
    context: RwLock<Option<Arc<ChromeContext>>>,
}

impl FramelessManager {
    /// A manager with no context yet; `instance()` is the shared one.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(context: Arc<ChromeContext>) -> Self {
        Self {
            context: RwLock::new(Some(context)),
        }
    }

    pub fn instance() -> &'static FramelessManager {
        INSTANCE.get_or_init(FramelessManager::new)
    }

    /// Creates the process context if there is none. Idempotent.
    pub fn initialize(&self) -> Arc<ChromeContext> {
        if let Some(context) = self.context.read().as_ref() {
            return Arc::clone(context);
        }
        let mut slot = self.context.write();
        Arc::clone(slot.get_or_insert_with(ChromeContext::system))
    }

    /// Releases every window and drops the context. A later call re-initializes.
    pub fn uninitialize(&self) {
        let context = self.context.write().take();
        if let Some(context) = context {
            context.shutdown();
            log::debug!("FramelessManager: uninitialized");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.context.read().is_some()
    }

    /// The current context, without creating one.
    pub fn context(&self) -> Option<Arc<ChromeContext>> {
        self.context.read().clone()
    }

    pub fn add_window(&self, host: Arc<dyn HostWindow>) -> bool {
        let context = self.initialize();
        match context.try_add_window(host) {
            Ok(added) => added,
            Err(err @ (ChromeError::InvalidHandle(_) | ChromeError::IncompleteCapabilities(_))) => {
                log::warn!("FramelessManager: rejected window: {err}");
                debug_assert!(false, "FramelessManager: rejected window: {err}");
                false
            }
            Err(err) => {
                log::error!("FramelessManager: could not take over window: {err}");
                false
            }
        }
    }

    pub fn remove_window(&self, handle: WindowHandle) -> bool {
        self.context().is_some_and(|context| context.remove_window(handle))
    }

    pub fn dispatch(&self, handle: WindowHandle, message: NativeMessage) -> bool {
        self.context().is_some_and(|context| context.dispatch(handle, message))
    }

    pub fn system_theme(&self) -> SystemTheme {
        self.initialize().theme().system_theme()
    }

    pub fn accent_color(&self) -> Color {
        self.initialize().theme().accent_color()
    }

    pub fn theme_snapshot(&self) -> ThemeSnapshot {
        self.initialize().theme().current()
    }

    pub fn refresh_theme(&self) -> bool {
        self.initialize().refresh_theme()
    }

    pub fn subscribe(&self, callback: impl Fn(&ThemeSnapshot) + Send + Sync + 'static) -> SubscriptionId {
        self.initialize().theme().subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.context().is_some_and(|context| context.theme().unsubscribe(id))
    }

    pub fn set_option(&self, option: ChromeOptions, on: bool) {
        self.initialize().config().set(option, on);
    }

    pub fn is_option_set(&self, option: ChromeOptions) -> bool {
        self.initialize().config().is_set(option)
    }
}
