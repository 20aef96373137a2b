/*
 * Lazy resolution of optional native entry points.
 *
 * Newer chrome features depend on functions that older OS releases do not
 * export (`GetDpiForWindow`, `GetSystemMetricsForDpi`, the undocumented uxtheme
 * dark-mode ordinals, ...). Linking them statically would make the whole crate
 * fail to load there, so they are looked up by name at first use. Both outcomes
 * are memoized: a missing symbol is looked up exactly once per process.
 */

use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol<'a> {
    Named(&'a str),
    /// Export ordinal; only meaningful on Windows (uxtheme's unnamed exports).
    Ordinal(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SymbolKey {
    Named(String),
    Ordinal(u16),
}

impl From<Symbol<'_>> for SymbolKey {
    fn from(symbol: Symbol<'_>) -> Self {
        match symbol {
            Symbol::Named(name) => SymbolKey::Named(name.to_owned()),
            Symbol::Ordinal(ordinal) => SymbolKey::Ordinal(ordinal),
        }
    }
}

/// The raw lookup the cache wraps. Returns the entry point address, if exported.
pub trait SymbolLoader: Send + Sync {
    fn load(&self, library: &str, symbol: Symbol<'_>) -> Option<usize>;
}

pub struct CapabilityLoader {
    loader: Box<dyn SymbolLoader>,
    cache: Mutex<HashMap<(String, SymbolKey), Option<usize>>>,
}

impl std::fmt::Debug for CapabilityLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityLoader")
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

impl CapabilityLoader {
    pub fn new(loader: Box<dyn SymbolLoader>) -> Self {
        Self {
            loader,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Loader backed by the platform's dynamic linker.
    pub fn system() -> Self {
        Self::new(Box::new(platform::DynamicLinkLoader))
    }

    /*
     * Returns the memoized address of `symbol` in `library`. The cache lock is
     * not held while the OS loader runs; if two threads race on the first
     * lookup, the first stored result wins and both observe it.
     */
    pub fn resolve(&self, library: &str, symbol: Symbol<'_>) -> Option<usize> {
        let key = (library.to_ascii_lowercase(), SymbolKey::from(symbol));
        if let Some(cached) = self.cache.lock().get(&key) {
            return *cached;
        }

        let resolved = self.loader.load(library, symbol);
        match resolved {
            Some(_) => log::debug!("CapabilityLoader: resolved {symbol:?} from {library}"),
            None => log::warn!("CapabilityLoader: {symbol:?} is not available in {library}"),
        }
        *self.cache.lock().entry(key).or_insert(resolved)
    }

    pub fn is_available(&self, library: &str, symbol: Symbol<'_>) -> bool {
        self.resolve(library, symbol).is_some()
    }

    /// Resolves `symbol` and reinterprets the address as the function pointer type `F`.
    ///
    /// # Safety
    /// `F` must be an `extern "system"` function pointer type whose signature
    /// matches the exported entry point.
    pub unsafe fn resolve_fn<F: Copy>(&self, library: &str, symbol: Symbol<'_>) -> Option<F> {
        debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<usize>());
        let address = self.resolve(library, symbol)?;
        // SAFETY: caller guarantees F is a pointer-sized fn type matching the export.
        Some(unsafe { std::mem::transmute_copy::<usize, F>(&address) })
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::{Symbol, SymbolLoader};
    use std::ffi::CString;
    use windows::Win32::System::LibraryLoader::{GetProcAddress, LoadLibraryW};
    use windows::core::{HSTRING, PCSTR};

    pub(super) struct DynamicLinkLoader;

    impl SymbolLoader for DynamicLinkLoader {
        fn load(&self, library: &str, symbol: Symbol<'_>) -> Option<usize> {
            // The module is intentionally never freed: resolved entry points live
            // for the rest of the process.
            let module = match unsafe { LoadLibraryW(&HSTRING::from(library)) } {
                Ok(module) => module,
                Err(err) => {
                    log::debug!("CapabilityLoader: failed to load {library}: {err:?}");
                    return None;
                }
            };
            let address = match symbol {
                Symbol::Named(name) => {
                    let name = CString::new(name).ok()?;
                    unsafe { GetProcAddress(module, PCSTR(name.as_ptr() as *const u8)) }
                }
                Symbol::Ordinal(ordinal) => unsafe {
                    GetProcAddress(module, PCSTR(ordinal as usize as *const u8))
                },
            };
            address.map(|func| func as usize)
        }
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::{Symbol, SymbolLoader};
    use std::ffi::CString;

    pub(super) struct DynamicLinkLoader;

    impl SymbolLoader for DynamicLinkLoader {
        fn load(&self, library: &str, symbol: Symbol<'_>) -> Option<usize> {
            let Symbol::Named(name) = symbol else {
                return None;
            };
            let library = CString::new(library).ok()?;
            let name = CString::new(name).ok()?;
            unsafe {
                let handle = libc::dlopen(library.as_ptr(), libc::RTLD_LAZY | libc::RTLD_LOCAL);
                if handle.is_null() {
                    return None;
                }
                let address = libc::dlsym(handle, name.as_ptr());
                (!address.is_null()).then_some(address as usize)
            }
        }
    }
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod platform {
    use super::{Symbol, SymbolLoader};

    pub(super) struct DynamicLinkLoader;

    impl SymbolLoader for DynamicLinkLoader {
        fn load(&self, _library: &str, _symbol: Symbol<'_>) -> Option<usize> {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl SymbolLoader for CountingLoader {
        fn load(&self, library: &str, symbol: Symbol<'_>) -> Option<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match (library, symbol) {
                ("user32.dll", Symbol::Named("GetDpiForWindow")) => Some(0x1000),
                ("uxtheme.dll", Symbol::Ordinal(135)) => Some(0x2000),
                _ => None,
            }
        }
    }

    fn loader() -> (CapabilityLoader, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = CapabilityLoader::new(Box::new(CountingLoader {
            calls: Arc::clone(&calls),
        }));
        (loader, calls)
    }

    #[test]
    fn successful_resolution_is_memoized() {
        let (loader, calls) = loader();
        assert_eq!(
            loader.resolve("user32.dll", Symbol::Named("GetDpiForWindow")),
            Some(0x1000)
        );
        assert_eq!(
            loader.resolve("USER32.dll", Symbol::Named("GetDpiForWindow")),
            Some(0x1000)
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_resolution_is_memoized_too() {
        let (loader, calls) = loader();
        assert!(!loader.is_available("user32.dll", Symbol::Named("GetDpiForWindowEx")));
        assert!(!loader.is_available("user32.dll", Symbol::Named("GetDpiForWindowEx")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ordinals_and_names_are_distinct_keys() {
        let (loader, _) = loader();
        assert!(loader.is_available("uxtheme.dll", Symbol::Ordinal(135)));
        assert!(!loader.is_available("uxtheme.dll", Symbol::Ordinal(136)));
    }

    #[test]
    fn concurrent_lookups_agree() {
        let (loader, _) = loader();
        let loader = Arc::new(loader);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                std::thread::spawn(move || {
                    loader.resolve("user32.dll", Symbol::Named("GetDpiForWindow"))
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(0x1000));
        }
    }
}
