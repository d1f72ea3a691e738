//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + profile):
//!   Windows: %APPDATA%\speech-assess\
//!   macOS:   ~/Library/Application Support/speech-assess/
//!   Linux:   ~/.config/speech-assess/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\speech-assess\
//!   macOS:   ~/Library/Application Support/speech-assess/
//!   Linux:   ~/.local/share/speech-assess/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and `profile.json`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Full path to the saved questionnaire answers, `profile.json`.
    pub profile_file: PathBuf,
    /// Directory for GGUF / GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "speech-assess";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let profile_file = config_dir.join("profile.json");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            profile_file,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.models_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .profile_file
            .file_name()
            .is_some_and(|n| n == "profile.json"));
    }
}
