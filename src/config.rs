//! Configuration handling for MathCanvas.
//!
//! `AppConfig` is read from `<config_dir>/MathCanvas/config.toml`. A missing
//! file is created with defaults; individual missing keys fall back to their
//! defaults. The service URL can be overridden by `MATHCANVAS_SERVICE_URL`
//! and by the `--service-url` CLI flag.

use anyhow::{Context, Result};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

pub const SERVICE_URL_ENV: &str = "MATHCANVAS_SERVICE_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_url: String,
    pub request_timeout_secs: u64,
    pub overlay_delay_ms: u64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub stroke_width: u32,
    pub brush_color: [u8; 3],
    pub debug_logging: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:8900".to_string(),
            request_timeout_secs: 30,
            overlay_delay_ms: 1000,
            canvas_width: 1280,
            canvas_height: 720,
            stroke_width: 3,
            brush_color: [255, 255, 255],
            debug_logging: false,
        }
    }
}

impl AppConfig {
    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        let config_dir = if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("MathCanvas")
        } else {
            PathBuf::from(".config/MathCanvas")
        };

        config_dir.join("config.toml")
    }

    /// Load the default config file, writing defaults when it does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("parsing {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let config = Self::default();
                config.save_to(&path)?;
                Ok(config)
            }
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Load a specific file. Never writes.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load the default file; on any error log it and fall back to defaults.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("config unavailable, using defaults: {:#}", e);
            Self::default()
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides: an explicit URL (CLI flag) beats the environment value,
    /// which beats the file.
    pub fn apply_overrides(&mut self, env_url: Option<String>, cli_url: Option<String>) {
        if let Some(url) = cli_url.or(env_url).filter(|u| !u.trim().is_empty()) {
            self.service_url = url;
        }
    }

    /// Read the environment override variable.
    pub fn env_service_url() -> Option<String> {
        std::env::var(SERVICE_URL_ENV).ok()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn overlay_step(&self) -> Duration {
        Duration::from_millis(self.overlay_delay_ms)
    }

    pub fn brush_color(&self) -> Rgba<u8> {
        let [r, g, b] = self.brush_color;
        Rgba([r, g, b, 255])
    }
}
