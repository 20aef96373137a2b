/*
 * Theme/accent observer.
 *
 * A `ThemeSource` reads the desktop appearance from the OS; the observer caches
 * the last snapshot and republishes it to subscribers when, and only when, a
 * refresh yields a snapshot that differs from the cached one. The first
 * successful refresh establishes the baseline without notifying anyone.
 */

use crate::error::Result;
use crate::types::{Color, SystemTheme, ThemeSnapshot, WallpaperAspectStyle};

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait ThemeSource: Send + Sync {
    fn snapshot(&self) -> Result<ThemeSnapshot>;
}

/// Identifies one subscription for `ThemeObserver::unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type ThemeCallback = Arc<dyn Fn(&ThemeSnapshot) + Send + Sync>;

/// Accent color reported when the OS has none (the Windows default blue).
pub const DEFAULT_ACCENT_COLOR: Color = Color::rgb(0x00, 0x78, 0xD4);

pub struct ThemeObserver {
    source: Box<dyn ThemeSource>,
    cached: Mutex<Option<ThemeSnapshot>>,
    subscribers: Mutex<Vec<(SubscriptionId, ThemeCallback)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ThemeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeObserver")
            .field("cached", &*self.cached.lock())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl ThemeObserver {
    pub fn new(source: Box<dyn ThemeSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Observer backed by the running desktop.
    pub fn system() -> Self {
        Self::new(platform::system_source())
    }

    pub fn subscribe(&self, callback: impl Fn(&ThemeSnapshot) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /*
     * Re-reads the OS state and notifies subscribers if anything changed.
     * Returns whether a change was published. Callbacks run after every lock
     * is released, so they may call back into the observer.
     */
    pub fn refresh(&self) -> bool {
        let snapshot = match self.source.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("ThemeObserver: failed to read desktop theme: {err}");
                return false;
            }
        };

        {
            let mut cached = self.cached.lock();
            match cached.as_ref() {
                None => {
                    log::debug!("ThemeObserver: initial theme {snapshot:?}");
                    *cached = Some(snapshot);
                    return false;
                }
                Some(previous) if *previous == snapshot => {
                    log::trace!("ThemeObserver: theme unchanged");
                    return false;
                }
                Some(_) => {
                    log::debug!("ThemeObserver: theme changed to {snapshot:?}");
                    *cached = Some(snapshot.clone());
                }
            }
        }

        let subscribers: Vec<ThemeCallback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in subscribers {
            callback(&snapshot);
        }
        true
    }

    /// The cached snapshot, reading the OS first if nothing has been cached yet.
    pub fn current(&self) -> ThemeSnapshot {
        if let Some(snapshot) = self.cached.lock().clone() {
            return snapshot;
        }
        self.refresh();
        self.cached.lock().clone().unwrap_or_default()
    }

    pub fn system_theme(&self) -> SystemTheme {
        self.current().theme
    }

    pub fn accent_color(&self) -> Color {
        self.current().accent_color
    }

    pub fn is_dark(&self) -> bool {
        self.system_theme() == SystemTheme::Dark
    }
}

/*
 * Decodes the `WallpaperStyle`/`TileWallpaper` pair from the desktop settings.
 * Unknown combinations fall back to Fill, the Windows default.
 */
pub fn wallpaper_style_from_settings(style: &str, tile: &str) -> WallpaperAspectStyle {
    match (style.trim(), tile.trim()) {
        ("0", "1") => WallpaperAspectStyle::Tile,
        ("0", _) => WallpaperAspectStyle::Center,
        ("2", _) => WallpaperAspectStyle::Stretch,
        ("6", _) => WallpaperAspectStyle::Fit,
        ("22", _) => WallpaperAspectStyle::Span,
        _ => WallpaperAspectStyle::Fill,
    }
}

/// Theme implied by a GTK theme name such as `Adwaita:dark` or `HighContrastInverse`.
pub fn theme_from_gtk_name(name: &str) -> Option<SystemTheme> {
    let lower = name.trim().to_ascii_lowercase();
    if lower.is_empty() {
        None
    } else if lower.contains("highcontrast") {
        Some(SystemTheme::HighContrast)
    } else if lower.ends_with(":dark") || lower.ends_with("-dark") || lower.ends_with("_dark") {
        Some(SystemTheme::Dark)
    } else {
        Some(SystemTheme::Light)
    }
}

/*
 * Reads the theme out of a gtk-3.0 `settings.ini`. The explicit
 * `gtk-application-prefer-dark-theme` switch wins over the theme name.
 */
pub fn theme_from_gtk_settings(text: &str) -> Option<SystemTheme> {
    let mut theme_name = None;
    let mut prefer_dark = None;
    for line in text.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') || line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "gtk-theme-name" => theme_name = theme_from_gtk_name(value),
            "gtk-application-prefer-dark-theme" => {
                prefer_dark = Some(matches!(value, "1" | "true" | "TRUE" | "True"))
            }
            _ => {}
        }
    }
    match (theme_name, prefer_dark) {
        (Some(SystemTheme::HighContrast), _) => Some(SystemTheme::HighContrast),
        (_, Some(true)) => Some(SystemTheme::Dark),
        (name, _) => name,
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::{DEFAULT_ACCENT_COLOR, ThemeSource, wallpaper_style_from_settings};
    use crate::error::Result;
    use crate::types::{Color, ColorizationArea, SystemTheme, ThemeSnapshot};

    use std::path::PathBuf;
    use windows::Win32::System::Registry::{
        HKEY_CURRENT_USER, RRF_RT_REG_DWORD, RRF_RT_REG_SZ, RegGetValueW,
    };
    use windows::Win32::UI::Accessibility::{HCF_HIGHCONTRASTON, HIGHCONTRASTW};
    use windows::Win32::UI::WindowsAndMessaging::{
        SPI_GETHIGHCONTRAST, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS, SystemParametersInfoW,
    };
    use windows::core::HSTRING;

    const PERSONALIZE_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Themes\Personalize";
    const DWM_KEY: &str = r"Software\Microsoft\Windows\DWM";
    const DESKTOP_KEY: &str = r"Control Panel\Desktop";

    pub(super) fn system_source() -> Box<dyn ThemeSource> {
        Box::new(RegistryThemeSource)
    }

    fn read_dword(subkey: &str, value: &str) -> Option<u32> {
        let mut data: u32 = 0;
        let mut size = std::mem::size_of::<u32>() as u32;
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                &HSTRING::from(subkey),
                &HSTRING::from(value),
                RRF_RT_REG_DWORD,
                None,
                Some(&mut data as *mut u32 as *mut _),
                Some(&mut size),
            )
        };
        status.is_ok().then_some(data)
    }

    fn read_string(subkey: &str, value: &str) -> Option<String> {
        let subkey = HSTRING::from(subkey);
        let value = HSTRING::from(value);
        let mut size: u32 = 0;
        let status = unsafe {
            RegGetValueW(HKEY_CURRENT_USER, &subkey, &value, RRF_RT_REG_SZ, None, None, Some(&mut size))
        };
        if status.is_err() || size == 0 {
            return None;
        }
        let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
        let status = unsafe {
            RegGetValueW(
                HKEY_CURRENT_USER,
                &subkey,
                &value,
                RRF_RT_REG_SZ,
                None,
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut size),
            )
        };
        if status.is_err() {
            return None;
        }
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        Some(String::from_utf16_lossy(&buffer[..len]))
    }

    fn high_contrast_enabled() -> bool {
        let mut info = HIGHCONTRASTW {
            cbSize: std::mem::size_of::<HIGHCONTRASTW>() as u32,
            ..Default::default()
        };
        let result = unsafe {
            SystemParametersInfoW(
                SPI_GETHIGHCONTRAST,
                info.cbSize,
                Some(&mut info as *mut HIGHCONTRASTW as *mut _),
                SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
            )
        };
        match result {
            Ok(()) => info.dwFlags.0 & HCF_HIGHCONTRASTON.0 != 0,
            Err(err) => {
                log::warn!("ThemeObserver: SPI_GETHIGHCONTRAST failed: {err}");
                false
            }
        }
    }

    struct RegistryThemeSource;

    impl ThemeSource for RegistryThemeSource {
        fn snapshot(&self) -> Result<ThemeSnapshot> {
            let theme = if high_contrast_enabled() {
                SystemTheme::HighContrast
            } else {
                match read_dword(PERSONALIZE_KEY, "AppsUseLightTheme") {
                    Some(0) => SystemTheme::Dark,
                    Some(_) => SystemTheme::Light,
                    None => SystemTheme::Unknown,
                }
            };
            let accent_color = read_dword(DWM_KEY, "AccentColor")
                .map(Color::from_abgr)
                .or_else(|| read_dword(DWM_KEY, "ColorizationColor").map(Color::from_argb))
                .map(|color| Color { a: 0xFF, ..color })
                .unwrap_or(DEFAULT_ACCENT_COLOR);
            let colorization_area = ColorizationArea::from_flags(
                read_dword(PERSONALIZE_KEY, "ColorPrevalence").is_some_and(|v| v != 0),
                read_dword(DWM_KEY, "ColorPrevalence").is_some_and(|v| v != 0),
            );
            let wallpaper = read_string(DESKTOP_KEY, "WallPaper")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from);
            let wallpaper_aspect_style = wallpaper_style_from_settings(
                &read_string(DESKTOP_KEY, "WallpaperStyle").unwrap_or_default(),
                &read_string(DESKTOP_KEY, "TileWallpaper").unwrap_or_default(),
            );
            Ok(ThemeSnapshot {
                theme,
                accent_color,
                colorization_area,
                wallpaper,
                wallpaper_aspect_style,
            })
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    use super::{DEFAULT_ACCENT_COLOR, ThemeSource, theme_from_gtk_name, theme_from_gtk_settings};
    use crate::error::Result;
    use crate::types::{SystemTheme, ThemeSnapshot};

    use std::path::PathBuf;

    pub(super) fn system_source() -> Box<dyn ThemeSource> {
        Box::new(GtkThemeSource)
    }

    fn settings_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join("gtk-3.0").join("settings.ini"))
    }

    /// `GTK_THEME` overrides the settings file, as it does for GTK itself.
    struct GtkThemeSource;

    impl ThemeSource for GtkThemeSource {
        fn snapshot(&self) -> Result<ThemeSnapshot> {
            let from_env = std::env::var("GTK_THEME")
                .ok()
                .and_then(|name| theme_from_gtk_name(&name));
            let theme = match from_env {
                Some(theme) => theme,
                None => settings_path()
                    .and_then(|path| std::fs::read_to_string(path).ok())
                    .and_then(|text| theme_from_gtk_settings(&text))
                    .unwrap_or(SystemTheme::Light),
            };
            Ok(ThemeSnapshot {
                theme,
                accent_color: DEFAULT_ACCENT_COLOR,
                ..ThemeSnapshot::default()
            })
        }
    }
}
