use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "sumantra.toml";
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// What the controller does when the prediction or diary service fails.
///
/// The default reports failures. The offline demo flow, where a failed
/// prediction shows the "Pink Rose (Rosa)" result and a failed diary load
/// shows demo entries, needs [`FailurePolicy::Placeholder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the failure and let the user retry.
    #[default]
    Surface,
    /// Substitute deterministic demo data so the flow stays usable offline.
    Placeholder,
}

impl FailurePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "surface" => Some(Self::Surface),
            "placeholder" | "demo" => Some(Self::Placeholder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_url: String,
    pub data_dir: Option<PathBuf>,
    pub failure_policy: FailurePolicy,
    pub request_timeout: Duration,
    pub diary_refresh_delay: Duration,
    pub max_upload_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".into(),
            data_dir: None,
            failure_policy: FailurePolicy::Surface,
            request_timeout: Duration::from_secs(30),
            diary_refresh_delay: Duration::from_millis(1000),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientSettings {
    /// Base URL with a guaranteed trailing slash so relative joins keep the
    /// `/api` segment.
    pub fn api_base(&self) -> anyhow::Result<Url> {
        let raw = self.api_url.trim();
        if raw.is_empty() {
            return Err(anyhow!("api_url must not be empty"));
        }
        let with_slash = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        let url = Url::parse(&with_slash).with_context(|| format!("invalid api_url '{raw}'"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("api_url must start with http:// or https://"));
        }
        Ok(url)
    }

    pub fn resolve_data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        let base = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("unable to resolve local app data dir"))?;
        Ok(base.join("sumantra"))
    }

    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        Ok(self.resolve_data_dir()?.join("settings.json"))
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Some(Path::new(DEFAULT_SETTINGS_FILE)), |key| {
        std::env::var(key).ok()
    })
}

/// Defaults, then the optional TOML file, then environment overrides.
pub fn load_settings_from(
    file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file.and_then(|path| fs::read_to_string(path).ok()) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_settings(&mut settings, &file_cfg),
            Err(err) => tracing::warn!(error = %err, "ignoring malformed settings file"),
        }
    }

    if let Some(v) = env("SUMANTRA_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__DATA_DIR") {
        settings.data_dir = Some(PathBuf::from(v));
    }
    if let Some(policy) = env("APP__FAILURE_POLICY").and_then(|v| FailurePolicy::parse(&v)) {
        settings.failure_policy = policy;
    }
    if let Some(secs) = env("APP__REQUEST_TIMEOUT_SECS")
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|secs| *secs > 0)
    {
        settings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = env("APP__DIARY_REFRESH_DELAY_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.diary_refresh_delay = Duration::from_millis(ms);
    }

    settings
}

fn apply_file_settings(settings: &mut ClientSettings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("api_url").and_then(toml::Value::as_str) {
        settings.api_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("data_dir").and_then(toml::Value::as_str) {
        settings.data_dir = Some(PathBuf::from(v));
    }
    if let Some(policy) = file_cfg
        .get("failure_policy")
        .and_then(toml::Value::as_str)
        .and_then(FailurePolicy::parse)
    {
        settings.failure_policy = policy;
    }
    if let Some(secs) = file_cfg
        .get("request_timeout_secs")
        .and_then(toml::Value::as_integer)
        .filter(|secs| *secs > 0)
    {
        settings.request_timeout = Duration::from_secs(secs as u64);
    }
    if let Some(ms) = file_cfg
        .get("diary_refresh_delay_ms")
        .and_then(toml::Value::as_integer)
        .filter(|ms| *ms >= 0)
    {
        settings.diary_refresh_delay = Duration::from_millis(ms as u64);
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
