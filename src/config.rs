/*
 * Process-wide option flags that gate optional chrome behaviors.
 *
 * Options come from three layers, resolved per option with the precedence
 * explicit `set()` > environment variable > INI file > compiled default (off).
 * The environment and the file are read lazily on first access and re-read by
 * `reload()`; explicit overrides survive a reload.
 *
 * The file is `framelesschrome.ini` next to the executable:
 *
 *     [Options]
 *     ForceHideFrameBorder = true
 *     CenterWindowBeforeShow = 1
 *
 * That shape is a TOML subset, so it is parsed with the `toml` crate once
 * INI `;` comment lines are blanked out.
 */

use crate::error::Result;

use bitflags::bitflags;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

pub const CONFIG_FILE_NAME: &str = "framelesschrome.ini";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ChromeOptions: u32 {
        const FORCE_HIDE_FRAME_BORDER = 1 << 0;
        const FORCE_SHOW_FRAME_BORDER = 1 << 1;
        const DISABLE_CROSS_PLATFORM_FALLBACK = 1 << 2;
        const USE_CROSS_PLATFORM_FALLBACK = 1 << 3;
        const DISABLE_SNAP_LAYOUT = 1 << 4;
        const ROUND_CORNERS = 1 << 5;
        const CENTER_BEFORE_SHOW = 1 << 6;
        const ENABLE_BLUR_BEHIND = 1 << 7;
    }
}

struct OptionSource {
    option: ChromeOptions,
    env_var: &'static str,
    ini_key: &'static str,
}

const OPTION_SOURCES: [OptionSource; 8] = [
    OptionSource {
        option: ChromeOptions::FORCE_HIDE_FRAME_BORDER,
        env_var: "FRAMELESS_CHROME_FORCE_HIDE_FRAME_BORDER",
        ini_key: "ForceHideFrameBorder",
    },
    OptionSource {
        option: ChromeOptions::FORCE_SHOW_FRAME_BORDER,
        env_var: "FRAMELESS_CHROME_FORCE_SHOW_FRAME_BORDER",
        ini_key: "ForceShowFrameBorder",
    },
    OptionSource {
        option: ChromeOptions::DISABLE_CROSS_PLATFORM_FALLBACK,
        env_var: "FRAMELESS_CHROME_DISABLE_FALLBACK",
        ini_key: "DisableCrossPlatformFallback",
    },
    OptionSource {
        option: ChromeOptions::USE_CROSS_PLATFORM_FALLBACK,
        env_var: "FRAMELESS_CHROME_USE_FALLBACK",
        ini_key: "UseCrossPlatformFallback",
    },
    OptionSource {
        option: ChromeOptions::DISABLE_SNAP_LAYOUT,
        env_var: "FRAMELESS_CHROME_DISABLE_SNAP_LAYOUT",
        ini_key: "DisableWindowsSnapLayout",
    },
    OptionSource {
        option: ChromeOptions::ROUND_CORNERS,
        env_var: "FRAMELESS_CHROME_ROUND_CORNERS",
        ini_key: "WindowUseRoundCorners",
    },
    OptionSource {
        option: ChromeOptions::CENTER_BEFORE_SHOW,
        env_var: "FRAMELESS_CHROME_CENTER_BEFORE_SHOW",
        ini_key: "CenterWindowBeforeShow",
    },
    OptionSource {
        option: ChromeOptions::ENABLE_BLUR_BEHIND,
        env_var: "FRAMELESS_CHROME_ENABLE_BLUR_BEHIND",
        ini_key: "EnableBlurBehindWindow",
    },
];

/*
 * One precedence layer: `mask` says which options this layer has an opinion
 * on, `values` carries that opinion. An option outside the mask falls through
 * to the next layer.
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Layer {
    mask: ChromeOptions,
    values: ChromeOptions,
}

impl Layer {
    fn record(&mut self, option: ChromeOptions, on: bool) {
        self.mask.insert(option);
        self.values.set(option, on);
    }

    fn opinion(&self, option: ChromeOptions) -> Option<bool> {
        self.mask
            .contains(option)
            .then(|| self.values.contains(option))
    }
}

#[derive(Debug, Default)]
struct ConfigState {
    loaded: bool,
    file: Layer,
    env: Layer,
    explicit: Layer,
    /// Times the conflicting frame border options were reported.
    border_conflict_warnings: u32,
}

impl ConfigState {
    fn resolve(&self, option: ChromeOptions) -> bool {
        self.explicit
            .opinion(option)
            .or_else(|| self.env.opinion(option))
            .or_else(|| self.file.opinion(option))
            .unwrap_or(false)
    }

    fn frame_border_conflict(&self) -> bool {
        self.resolve(ChromeOptions::FORCE_HIDE_FRAME_BORDER) && self.resolve(ChromeOptions::FORCE_SHOW_FRAME_BORDER)
    }

    /// Warns when the layers just became conflicting; stays quiet while the conflict persists.
    fn check_frame_border_conflict(&mut self, was_conflicting: bool) {
        if self.frame_border_conflict() && !was_conflicting {
            self.border_conflict_warnings += 1;
            log::warn!("Config: both ForceHideFrameBorder and ForceShowFrameBorder are set; hiding");
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    #[serde(rename = "Options", default)]
    options: HashMap<String, FlagValue>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FlagValue {
    fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            FlagValue::Int(i) => Some(*i != 0),
            FlagValue::Text(s) => parse_truthy(s),
        }
    }
}

/*
 * Interprets an environment/INI string. Unrecognized text yields `None` so the
 * layer keeps no opinion about the option.
 */
fn parse_truthy(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if let Ok(number) = value.parse::<i64>() {
        return Some(number != 0);
    }
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn env_layer(lookup: &dyn Fn(&str) -> Option<String>) -> Layer {
    let mut layer = Layer::default();
    for source in &OPTION_SOURCES {
        let Some(raw) = lookup(source.env_var) else {
            continue;
        };
        match parse_truthy(&raw) {
            Some(on) => layer.record(source.option, on),
            None => log::warn!(
                "Config: ignoring unrecognized value '{raw}' for environment variable {}",
                source.env_var
            ),
        }
    }
    layer
}

// Blanks INI comment lines, keeping line numbers intact for parse errors.
fn strip_ini_comments(text: &str) -> String {
    text.lines()
        .map(|line| if line.trim_start().starts_with(';') { "" } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

fn file_layer(text: &str) -> Result<Layer> {
    let parsed: ConfigFile = toml::from_str(&strip_ini_comments(text))?;
    let mut layer = Layer::default();
    for source in &OPTION_SOURCES {
        let Some(value) = parsed.options.get(source.ini_key) else {
            continue;
        };
        match value.as_bool() {
            Some(on) => layer.record(source.option, on),
            None => log::warn!(
                "Config: ignoring unrecognized value {value:?} for key '{}'",
                source.ini_key
            ),
        }
    }
    Ok(layer)
}

fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

fn read_default_config_file() -> Option<(PathBuf, String)> {
    let path = default_config_path()?;
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            log::debug!("Config: read options from {}", path.display());
            Some((path, text))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            log::warn!("Config: failed to read {}: {err}", path.display());
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct ChromeConfig {
    state: RwLock<ConfigState>,
}

impl ChromeConfig {
    /// Creates an unloaded configuration; the process environment and the file
    /// beside the executable are read on first access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration from explicit sources instead of the process environment.
    pub fn from_sources(
        env_lookup: impl Fn(&str) -> Option<String>,
        file_text: Option<&str>,
    ) -> Result<Self> {
        let config = Self::default();
        config.reload_from(env_lookup, file_text)?;
        Ok(config)
    }

    pub fn is_set(&self, option: ChromeOptions) -> bool {
        self.ensure_loaded();
        self.state.read().resolve(option)
    }

    /// Explicit in-process override; wins over every other layer until cleared.
    pub fn set(&self, option: ChromeOptions, on: bool) {
        self.ensure_loaded();
        log::debug!("Config: explicit override {option:?} = {on}");
        let mut state = self.state.write();
        let was_conflicting = state.frame_border_conflict();
        state.explicit.record(option, on);
        state.check_frame_border_conflict(was_conflicting);
    }

    pub fn clear_override(&self, option: ChromeOptions) {
        let mut state = self.state.write();
        let was_conflicting = state.frame_border_conflict();
        state.explicit.mask.remove(option);
        state.explicit.values.remove(option);
        state.check_frame_border_conflict(was_conflicting);
    }

    /// All options that currently resolve to on.
    pub fn effective(&self) -> ChromeOptions {
        self.ensure_loaded();
        let state = self.state.read();
        OPTION_SOURCES
            .iter()
            .filter(|source| state.resolve(source.option))
            .fold(ChromeOptions::empty(), |acc, source| acc | source.option)
    }

    /// Re-reads the process environment and the config file. Explicit overrides are kept.
    pub fn reload(&self) {
        let file = read_default_config_file();
        let file_text = file.as_ref().map(|(_, text)| text.as_str());
        if let Err(err) = self.reload_from(|name| std::env::var(name).ok(), file_text) {
            let path = file.as_ref().map(|(path, _)| path.display().to_string()).unwrap_or_default();
            log::warn!("Config: {path}: {err}; file options ignored");
        }
    }

    /*
     * Replaces the environment and file layers. A file that fails to parse
     * leaves the file layer empty (and reports why) while the environment layer
     * is still applied.
     */
    pub fn reload_from(
        &self,
        env_lookup: impl Fn(&str) -> Option<String>,
        file_text: Option<&str>,
    ) -> Result<()> {
        let env = env_layer(&env_lookup);
        let file = file_text.map(file_layer).transpose();

        let mut state = self.state.write();
        let was_conflicting = state.loaded && state.frame_border_conflict();
        state.loaded = true;
        state.env = env;
        let result = match file {
            Ok(layer) => {
                state.file = layer.unwrap_or_default();
                Ok(())
            }
            Err(err) => {
                state.file = Layer::default();
                Err(err)
            }
        };
        state.check_frame_border_conflict(was_conflicting);
        result
    }

    /*
     * Whether the native frame border (left/right/bottom resize borders and the
     * 1px accent line) stays visible. Forcing both ways is a configuration
     * mistake, reported when the options are loaded or set; hiding wins.
     */
    pub fn frame_border_visible(&self, os_draws_frame_border: bool) -> bool {
        let force_hide = self.is_set(ChromeOptions::FORCE_HIDE_FRAME_BORDER);
        let force_show = self.is_set(ChromeOptions::FORCE_SHOW_FRAME_BORDER);
        !force_hide && (force_show || os_draws_frame_border)
    }

    fn ensure_loaded(&self) {
        if self.state.read().loaded {
            return;
        }
        self.reload();
    }
}
