use std::{fs, io, path::Path, time::Duration};

use anyhow::Context;
use client_core::{ControllerConfig, SynthesizedProgress};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "generator.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub backend_url: String,
    pub connect_timeout_secs: u64,
    pub stall_timeout_secs: u64,
    pub animate_progress: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8080".into(),
            connect_timeout_secs: 30,
            stall_timeout_secs: 300,
            animate_progress: true,
        }
    }
}

impl Settings {
    pub fn controller_config(&self) -> anyhow::Result<ControllerConfig> {
        let progress = if self.animate_progress {
            SynthesizedProgress::default()
        } else {
            SynthesizedProgress::default().without_holds()
        };
        Ok(ControllerConfig::new(&self.backend_url)?
            .with_connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .with_stall_timeout(Duration::from_secs(self.stall_timeout_secs))
            .with_synthesized_progress(progress))
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    backend_url: Option<String>,
    connect_timeout_secs: Option<u64>,
    stall_timeout_secs: Option<u64>,
    animate_progress: Option<bool>,
}

/// Defaults, then the config file, then environment variables.
///
/// An explicitly named config file must exist; the default one is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.backend_url {
        settings.backend_url = v;
    }
    if let Some(v) = file_cfg.connect_timeout_secs {
        settings.connect_timeout_secs = v;
    }
    if let Some(v) = file_cfg.stall_timeout_secs {
        settings.stall_timeout_secs = v;
    }
    if let Some(v) = file_cfg.animate_progress {
        settings.animate_progress = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BACKEND_URL") {
        settings.backend_url = v;
    }
    if let Some(v) = lookup("APP__BACKEND_URL") {
        settings.backend_url = v;
    }

    if let Some(v) = lookup("APP__CONNECT_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.connect_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__STALL_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.stall_timeout_secs = parsed;
        }
    }
    if let Some(v) = lookup("APP__ANIMATE_PROGRESS") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.animate_progress = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
