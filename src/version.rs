/*
 * OS version tiers and the chrome features each tier unlocks.
 *
 * Detection runs once per process; every gate below is a pure comparison on
 * the detected `OsVersion`, which keeps the gating logic testable on any host.
 */

use crate::sysapi::CapabilityLoader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl OsVersion {
    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self {
            major,
            minor,
            build,
        }
    }
}

impl std::fmt::Display for OsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// Named Windows releases the chrome code distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WindowsRelease {
    Win7,
    Win8,
    Win8_1,
    Win10,
    Win10_1607,
    Win10_1809,
    Win10_19H1,
    Win10_20H1,
    Win11,
    Win11_22H2,
}

impl WindowsRelease {
    pub const fn version(self) -> OsVersion {
        match self {
            WindowsRelease::Win7 => OsVersion::new(6, 1, 7600),
            WindowsRelease::Win8 => OsVersion::new(6, 2, 9200),
            WindowsRelease::Win8_1 => OsVersion::new(6, 3, 9600),
            WindowsRelease::Win10 => OsVersion::new(10, 0, 10240),
            WindowsRelease::Win10_1607 => OsVersion::new(10, 0, 14393),
            WindowsRelease::Win10_1809 => OsVersion::new(10, 0, 17763),
            WindowsRelease::Win10_19H1 => OsVersion::new(10, 0, 18362),
            WindowsRelease::Win10_20H1 => OsVersion::new(10, 0, 19041),
            WindowsRelease::Win11 => OsVersion::new(10, 0, 22000),
            WindowsRelease::Win11_22H2 => OsVersion::new(10, 0, 22621),
        }
    }
}

/// Build that renamed `DWMWA_USE_IMMERSIVE_DARK_MODE` from 19 to 20.
const DARK_MODE_ATTRIBUTE_RENAME_BUILD: u32 = 18985;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    Windows(OsVersion),
    Linux,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureSet {
    family: OsFamily,
}

impl FeatureSet {
    pub const fn new(family: OsFamily) -> Self {
        Self { family }
    }

    pub const fn family(&self) -> OsFamily {
        self.family
    }

    pub fn windows_version(&self) -> Option<OsVersion> {
        match self.family {
            OsFamily::Windows(version) => Some(version),
            _ => None,
        }
    }

    pub fn is_windows_at_least(&self, release: WindowsRelease) -> bool {
        self.windows_version()
            .is_some_and(|version| version >= release.version())
    }

    /// Windows 10 and later draw a 1px frame border themselves.
    pub fn os_draws_frame_border(&self) -> bool {
        self.is_windows_at_least(WindowsRelease::Win10)
    }

    /// Hovering the maximize button opens the snap-layout flyout.
    pub fn supports_snap_layout(&self) -> bool {
        self.is_windows_at_least(WindowsRelease::Win11)
    }

    pub fn supports_round_corners(&self) -> bool {
        self.is_windows_at_least(WindowsRelease::Win11)
    }

    /// `DWMWA_SYSTEMBACKDROP_TYPE` (Mica) is only honored from 22H2.
    pub fn supports_mica(&self) -> bool {
        self.is_windows_at_least(WindowsRelease::Win11_22H2)
    }

    pub fn supports_per_monitor_dpi(&self) -> bool {
        self.is_windows_at_least(WindowsRelease::Win10_1607)
    }

    /*
     * The DWM attribute id that toggles the dark title bar, or `None` when the
     * OS has no dark title bar at all.
     */
    pub fn dark_mode_attribute(&self) -> Option<u32> {
        let version = self.windows_version()?;
        if version < WindowsRelease::Win10_1809.version() {
            None
        } else if version.build < DARK_MODE_ATTRIBUTE_RENAME_BUILD {
            Some(19)
        } else {
            Some(20)
        }
    }

    /// Detects the running OS. Windows versions come from `RtlGetVersion`,
    /// which unlike `GetVersionEx` is not subject to manifest-based lying.
    pub fn detect(loader: &CapabilityLoader) -> Self {
        let family = detect_family(loader);
        log::debug!("VersionDetector: running on {family:?}");
        Self { family }
    }
}

#[cfg(target_os = "windows")]
fn detect_family(loader: &CapabilityLoader) -> OsFamily {
    use crate::sysapi::Symbol;
    use windows::Win32::System::SystemInformation::OSVERSIONINFOW;

    type RtlGetVersionFn = unsafe extern "system" fn(*mut OSVERSIONINFOW) -> i32;

    // SAFETY: RtlGetVersion has exactly this signature in every ntdll release.
    let rtl_get_version: Option<RtlGetVersionFn> =
        unsafe { loader.resolve_fn("ntdll.dll", Symbol::Named("RtlGetVersion")) };
    let Some(rtl_get_version) = rtl_get_version else {
        log::warn!("VersionDetector: RtlGetVersion unavailable; assuming Windows 7");
        return OsFamily::Windows(WindowsRelease::Win7.version());
    };

    // SAFETY: OSVERSIONINFOW is plain old data; all-zero is a valid value.
    let mut info: OSVERSIONINFOW = unsafe { std::mem::zeroed() };
    info.dwOSVersionInfoSize = std::mem::size_of::<OSVERSIONINFOW>() as u32;
    // SAFETY: info is a properly sized, writable OSVERSIONINFOW.
    let status = unsafe { rtl_get_version(&mut info) };
    if status != 0 {
        log::warn!("VersionDetector: RtlGetVersion failed with status {status:#x}");
        return OsFamily::Windows(WindowsRelease::Win7.version());
    }
    OsFamily::Windows(OsVersion::new(
        info.dwMajorVersion,
        info.dwMinorVersion,
        info.dwBuildNumber,
    ))
}

#[cfg(target_os = "linux")]
fn detect_family(_loader: &CapabilityLoader) -> OsFamily {
    OsFamily::Linux
}

#[cfg(not(any(target_os = "windows", target_os = "linux")))]
fn detect_family(_loader: &CapabilityLoader) -> OsFamily {
    OsFamily::Other
}
