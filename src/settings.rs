use std::path::{Path, PathBuf};

use crate::ai::RenderingStyle;
use crate::ai::remix::DEFAULT_CREATIVITY;
use crate::mask::DEFAULT_BRUSH_SIZE;

const SETTINGS_FILE: &str = "stylegen_settings.cfg";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write settings file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Application settings that persist across sessions
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Key for the generative API. Overridden by GEMINI_API_KEY / API_KEY.
    pub api_key: String,
    /// Base URL of the generative API (no trailing slash needed)
    pub api_base_url: String,
    /// Model used for structured image analysis
    pub analysis_model: String,
    /// Model used for inpainting and remixing
    pub image_model: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    pub default_brush_size: f32,
    /// 0–100
    pub default_creativity: u8,
    pub default_rendering_style: RenderingStyle,

    /// Whether environment variables may supply the API key (not persisted)
    pub env_override: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            analysis_model: "gemini-2.5-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            request_timeout_secs: 120,
            default_brush_size: DEFAULT_BRUSH_SIZE,
            default_creativity: DEFAULT_CREATIVITY,
            default_rendering_style: RenderingStyle::default(),
            env_override: true,
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/stylegen/stylegen_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\StyleGen\stylegen_settings.cfg
    /// On macOS:   ~/Library/Application Support/StyleGen/stylegen_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").ok()?;
            return Some(PathBuf::from(appdata).join("StyleGen").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("StyleGen")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
                .ok()?;
            Some(config_dir.join("stylegen").join(SETTINGS_FILE))
        }
    }

    /// Load from the default location (defaults if missing or corrupt).
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Load from an explicit path. Unlike [`AppSettings::load`], a missing
    /// file is an error: the user asked for it by name.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Parse `key=value` lines. Unknown keys and bad values are ignored.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "api_key" => s.api_key = val.to_string(),
                "api_base_url" => {
                    if !val.is_empty() {
                        s.api_base_url = val.to_string();
                    }
                }
                "analysis_model" => {
                    if !val.is_empty() {
                        s.analysis_model = val.to_string();
                    }
                }
                "image_model" => {
                    if !val.is_empty() {
                        s.image_model = val.to_string();
                    }
                }
                "request_timeout_secs" => {
                    s.request_timeout_secs = val.parse().unwrap_or(s.request_timeout_secs);
                }
                "default_brush_size" => {
                    s.default_brush_size = val
                        .parse::<f32>()
                        .ok()
                        .filter(|v| v.is_finite() && *v >= 0.0)
                        .unwrap_or(s.default_brush_size);
                }
                "default_creativity" => {
                    s.default_creativity = val
                        .parse::<u8>()
                        .map(|v| v.min(100))
                        .unwrap_or(s.default_creativity);
                }
                "default_rendering_style" => {
                    if let Some(style) = RenderingStyle::parse(val) {
                        s.default_rendering_style = style;
                    }
                }
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_key={}\n\
             api_base_url={}\n\
             analysis_model={}\n\
             image_model={}\n\
             request_timeout_secs={}\n\
             default_brush_size={}\n\
             default_creativity={}\n\
             default_rendering_style={}\n",
            self.api_key,
            self.api_base_url,
            self.analysis_model,
            self.image_model,
            self.request_timeout_secs,
            self.default_brush_size,
            self.default_creativity,
            self.default_rendering_style.prompt_label(),
        )
    }

    /// Save settings to `path`, creating its directory.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, self.to_config_string()).map_err(write_err)
    }

    /// Disable the environment variable override (settings file only).
    pub fn without_env_override(mut self) -> Self {
        self.env_override = false;
        self
    }

    /// The key to use: GEMINI_API_KEY, then API_KEY, then the file value.
    pub fn effective_api_key(&self) -> Option<String> {
        if self.env_override {
            for var in ["GEMINI_API_KEY", "API_KEY"] {
                if let Ok(key) = std::env::var(var) {
                    if !key.trim().is_empty() {
                        return Some(key.trim().to_string());
                    }
                }
            }
        }
        let key = self.api_key.trim();
        (!key.is_empty()).then(|| key.to_string())
    }
}
