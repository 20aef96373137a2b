/*
 * Error taxonomy for the chrome engine.
 *
 * Three families exist: invalid input (`InvalidHandle`, `IncompleteCapabilities`),
 * optional features the running OS does not offer (`FeatureUnavailable`), and
 * unexpected OS call failures (`OperationFailed` plus the platform-specific
 * wrappers). None of them is fatal: the facade logs and degrades, so these
 * values mostly travel between internal layers and tests.
 */

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChromeError {
    #[error("invalid window handle: {0}")]
    InvalidHandle(String),

    #[error("incomplete host capabilities: missing {0}")]
    IncompleteCapabilities(String),

    #[error("feature unavailable: {0}")]
    FeatureUnavailable(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[cfg(target_os = "windows")]
    #[error("Win32 error: {0}")]
    Win32(#[from] windows::core::Error),

    #[cfg(target_os = "linux")]
    #[error("X11 error: {0}")]
    X11(String),
}

impl ChromeError {
    /// Category (b): the caller should fall back instead of reporting an error.
    pub fn is_feature_unavailable(&self) -> bool {
        matches!(self, ChromeError::FeatureUnavailable(_))
    }
}

impl From<toml::de::Error> for ChromeError {
    fn from(e: toml::de::Error) -> Self {
        ChromeError::Config(e.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<x11rb::errors::ConnectError> for ChromeError {
    fn from(e: x11rb::errors::ConnectError) -> Self {
        ChromeError::X11(e.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<x11rb::errors::ConnectionError> for ChromeError {
    fn from(e: x11rb::errors::ConnectionError) -> Self {
        ChromeError::X11(e.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<x11rb::errors::ReplyError> for ChromeError {
    fn from(e: x11rb::errors::ReplyError) -> Self {
        ChromeError::X11(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChromeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ChromeError::IncompleteCapabilities("window_state, set_window_state".into());
        assert_eq!(
            err.to_string(),
            "incomplete host capabilities: missing window_state, set_window_state"
        );
    }

    #[test]
    fn feature_unavailable_is_classified_as_degradable() {
        assert!(ChromeError::FeatureUnavailable("Mica".into()).is_feature_unavailable());
        assert!(!ChromeError::OperationFailed("SetWindowPos".into()).is_feature_unavailable());
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let parse_err = "[Options\nbroken".parse::<toml::Table>().unwrap_err();
        let err: ChromeError = parse_err.into();
        assert!(matches!(err, ChromeError::Config(_)));
    }
}
