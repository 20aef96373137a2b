/*
 * Per-window side table.
 *
 * Maps each registered native window handle to everything the interceptor
 * needs while answering that window's messages. One mutex guards the whole
 * map and is held only for the map operation itself: `lookup` hands out a
 * copy, and `update` closures must not call into the OS or the host. Native
 * callbacks may arrive nested inside another window's dispatch, so holding the
 * lock across such a call would deadlock.
 */

use crate::error::{ChromeError, Result};
use crate::geometry::DragSession;
use crate::host::HostWindow;
use crate::types::{Dpi, Point, SystemButtonType, WindowHandle};

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type RestoreFn = Box<dyn FnOnce() + Send>;

/*
 * Ownership of an installed message hook. Releasing it puts the previous
 * message procedure back; it runs at most once, either through an explicit
 * `release()` or when the last clone of the owning `Arc` is dropped.
 */
pub struct HookGuard {
    window: WindowHandle,
    released: AtomicBool,
    restore: Mutex<Option<RestoreFn>>,
}

impl HookGuard {
    pub fn new(window: WindowHandle, restore: impl FnOnce() + Send + 'static) -> Self {
        Self {
            window,
            released: AtomicBool::new(false),
            restore: Mutex::new(Some(Box::new(restore))),
        }
    }

    /// A guard with nothing to undo, for backends that never replace a procedure.
    pub fn noop(window: WindowHandle) -> Self {
        Self {
            window,
            released: AtomicBool::new(true),
            restore: Mutex::new(None),
        }
    }

    pub fn window(&self) -> WindowHandle {
        self.window
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let restore = self.restore.lock().take();
        if let Some(restore) = restore {
            log::debug!("Registry: restoring original message procedure of {}", self.window);
            restore();
        }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for HookGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookGuard")
            .field("window", &self.window)
            .field("released", &self.is_released())
            .finish()
    }
}

#[derive(Clone)]
pub struct PerWindowState {
    /// Address of the message procedure that was active before the hook; 0 if none.
    pub original_proc: usize,
    pub params: Arc<dyn HostWindow>,
    pub dpi: Dpi,
    /// A mouse-leave notification is currently requested for this window.
    pub tracking_mouse: bool,
    /// Transparent overlay that makes the OS show its snap-layout flyout.
    pub snap_helper: Option<WindowHandle>,
    pub hovered_button: Option<SystemButtonType>,
    pub pressed_button: Option<SystemButtonType>,
    pub drag: Option<DragSession>,
    /// Timestamp (ms) and screen position of the last caption press.
    pub last_caption_click: Option<(u64, Point)>,
    pub hook: Option<Arc<HookGuard>>,
}

impl PerWindowState {
    pub fn new(params: Arc<dyn HostWindow>, dpi: Dpi) -> Self {
        Self {
            original_proc: 0,
            params,
            dpi,
            tracking_mouse: false,
            snap_helper: None,
            hovered_button: None,
            pressed_button: None,
            drag: None,
            last_caption_click: None,
            hook: None,
        }
    }
}

impl std::fmt::Debug for PerWindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerWindowState")
            .field("original_proc", &format_args!("{:#x}", self.original_proc))
            .field("dpi", &self.dpi)
            .field("tracking_mouse", &self.tracking_mouse)
            .field("snap_helper", &self.snap_helper)
            .field("hovered_button", &self.hovered_button)
            .field("pressed_button", &self.pressed_button)
            .field("drag", &self.drag)
            .field("hook", &self.hook)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<WindowHandle, PerWindowState>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /*
     * Registers `handle`. Returns `Ok(false)` when it is already registered,
     * leaving the existing entry untouched.
     */
    pub fn insert(&self, handle: WindowHandle, params: Arc<dyn HostWindow>, dpi: Dpi) -> Result<bool> {
        if handle.is_null() {
            return Err(ChromeError::InvalidHandle(handle.to_string()));
        }
        let missing = params.missing_capabilities();
        if !missing.is_empty() {
            return Err(ChromeError::IncompleteCapabilities(missing.join(", ")));
        }

        let mut windows = self.windows.lock();
        if windows.contains_key(&handle) {
            log::debug!("Registry: {handle} is already registered");
            return Ok(false);
        }
        windows.insert(handle, PerWindowState::new(params, dpi));
        log::debug!("Registry: registered {handle} ({} windows)", windows.len());
        Ok(true)
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.windows.lock().contains_key(&handle)
    }

    pub fn lookup(&self, handle: WindowHandle) -> Option<PerWindowState> {
        self.windows.lock().get(&handle).cloned()
    }

    /// Mutates the entry in place. `f` runs under the registry lock.
    pub fn update<R>(&self, handle: WindowHandle, f: impl FnOnce(&mut PerWindowState) -> R) -> Option<R> {
        self.windows.lock().get_mut(&handle).map(f)
    }

    pub fn remove(&self, handle: WindowHandle) -> Option<PerWindowState> {
        let removed = self.windows.lock().remove(&handle);
        if removed.is_some() {
            log::debug!("Registry: unregistered {handle}");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    pub fn handles(&self) -> Vec<WindowHandle> {
        self.windows.lock().keys().copied().collect()
    }

    /// The registered window whose snap helper overlay is `helper`.
    pub fn owner_of_helper(&self, helper: WindowHandle) -> Option<WindowHandle> {
        self.windows
            .lock()
            .iter()
            .find(|(_, state)| state.snap_helper == Some(helper))
            .map(|(handle, _)| *handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use std::sync::atomic::AtomicUsize;

    fn host(handle: usize) -> Arc<dyn HostWindow> {
        Arc::new(MockHost::new(WindowHandle(handle)))
    }

    #[test]
    fn insert_is_idempotent() {
        let registry = WindowRegistry::new();
        assert!(registry.insert(WindowHandle(1), host(1), Dpi::DEFAULT).unwrap());
        registry.update(WindowHandle(1), |state| state.tracking_mouse = true);

        assert!(!registry.insert(WindowHandle(1), host(1), Dpi::uniform(192)).unwrap());

        assert_eq!(registry.len(), 1);
        let state = registry.lookup(WindowHandle(1)).unwrap();
        assert!(state.tracking_mouse);
        assert_eq!(state.dpi, Dpi::DEFAULT);
    }

    #[test]
    fn invalid_input_is_rejected_without_side_effects() {
        let registry = WindowRegistry::new();

        let null = registry.insert(WindowHandle::NULL, host(0), Dpi::DEFAULT);
        assert!(matches!(null, Err(ChromeError::InvalidHandle(_))));

        let incomplete = Arc::new(MockHost::new(WindowHandle(2)).missing("show_system_menu"));
        let result = registry.insert(WindowHandle(2), incomplete, Dpi::DEFAULT);
        assert!(matches!(result, Err(ChromeError::IncompleteCapabilities(ref m)) if m == "show_system_menu"));

        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_returns_an_independent_copy() {
        let registry = WindowRegistry::new();
        registry.insert(WindowHandle(3), host(3), Dpi::DEFAULT).unwrap();

        let mut copy = registry.lookup(WindowHandle(3)).unwrap();
        copy.dpi = Dpi::uniform(144);

        assert_eq!(registry.lookup(WindowHandle(3)).unwrap().dpi, Dpi::DEFAULT);
    }

    #[test]
    fn remove_absent_handle_is_a_no_op() {
        let registry = WindowRegistry::new();
        assert!(registry.remove(WindowHandle(9)).is_none());
        assert!(registry.update(WindowHandle(9), |_| ()).is_none());
    }

    #[test]
    fn helper_owner_lookup() {
        let registry = WindowRegistry::new();
        registry.insert(WindowHandle(4), host(4), Dpi::DEFAULT).unwrap();
        registry.update(WindowHandle(4), |state| state.snap_helper = Some(WindowHandle(40)));

        assert_eq!(registry.owner_of_helper(WindowHandle(40)), Some(WindowHandle(4)));
        assert_eq!(registry.owner_of_helper(WindowHandle(41)), None);
    }

    #[test]
    fn hook_guard_restores_exactly_once() {
        // Arrange
        let restored = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restored);
        let guard = Arc::new(HookGuard::new(WindowHandle(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let clone = Arc::clone(&guard);

        // Act
        guard.release();
        guard.release();
        drop(guard);
        drop(clone);

        // Assert
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hook_guard_restores_on_drop_of_last_clone() {
        let restored = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&restored);
        let registry = WindowRegistry::new();
        registry.insert(WindowHandle(6), host(6), Dpi::DEFAULT).unwrap();
        registry.update(WindowHandle(6), |state| {
            state.hook = Some(Arc::new(HookGuard::new(WindowHandle(6), move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })));
        });

        let copy = registry.lookup(WindowHandle(6)).unwrap();
        registry.remove(WindowHandle(6));
        assert_eq!(restored.load(Ordering::SeqCst), 0);

        drop(copy);
        assert_eq!(restored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_inserts_keep_one_entry_per_handle() {
        let registry = Arc::new(WindowRegistry::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .insert(WindowHandle(100 + i % 2), host(100 + i % 2), Dpi::DEFAULT)
                        .unwrap()
                })
            })
            .collect();
        let inserted = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|inserted| *inserted)
            .count();

        assert_eq!(inserted, 2);
        assert_eq!(registry.len(), 2);
    }
}
