//! Settings loading, validation, and management for plotmaster.
//!
//! Loads settings from `~/.plotmaster/settings.toml` with environment
//! variable overrides. Field names follow the host's camelCase keys so a
//! settings blob exported from the host parses unchanged (`.json` files are
//! accepted as well as TOML).

pub mod overrides;

pub use overrides::{strip_prompt_keys, ApiSettingsOverride, PROMPT_OVERRIDE_KEYS};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Name the extension's data is stored under on character cards.
pub const EXTENSION_NAME: &str = "quick-response-force";

/// Directive used when the resolved final directive is empty.
pub const DEFAULT_FINAL_DIRECTIVE: &str = "[SYSTEM_DIRECTIVE: You are a storyteller. The following <plot> block is your absolute script for this turn. You MUST follow the <directive> within it to generate the story.]";

/// The root settings structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Master switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum accepted plan length in characters (0 = accept anything non-empty)
    #[serde(default)]
    pub min_length: u32,

    /// Preset applied on chat change and forced over character overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_preset_name: Option<String>,

    /// Named prompt bundles
    #[serde(default)]
    pub prompt_presets: Vec<PromptPreset>,

    /// Planner API and prompt configuration
    #[serde(default)]
    pub api_settings: ApiSettings,
}

/// Which backend answers planning requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// An OpenAI-compatible endpoint at `apiUrl`
    #[default]
    OpenAi,
    /// The host application's own generation backend
    Tavern,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    #[serde(default)]
    pub api_mode: ApiMode,

    #[serde(default)]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_main_prompt")]
    pub main_prompt: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default = "default_final_directive")]
    pub final_system_directive: String,

    #[serde(default = "default_rate")]
    pub rate_main: f64,

    #[serde(default = "default_rate")]
    pub rate_personal: f64,

    #[serde(default = "default_rate")]
    pub rate_erotic: f64,

    #[serde(default = "default_rate")]
    pub rate_cuckold: f64,

    /// How many trailing assistant turns are sent as context (<= 0 = none)
    #[serde(default = "default_context_turns")]
    pub context_turn_count: i64,

    #[serde(default)]
    pub worldbook_enabled: bool,

    /// Comma-separated tag names to extract from the plan
    #[serde(default)]
    pub extract_tags: String,
}

/// A named bundle of prompt and rate fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPreset {
    pub name: String,

    #[serde(default)]
    pub main_prompt: String,

    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub final_system_directive: String,

    #[serde(default = "default_rate")]
    pub rate_main: f64,

    #[serde(default = "default_rate")]
    pub rate_personal: f64,

    #[serde(default = "default_rate")]
    pub rate_erotic: f64,

    #[serde(default = "default_rate")]
    pub rate_cuckold: f64,
}

fn default_true() -> bool {
    true
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f32 {
    0.7
}
fn default_rate() -> f64 {
    1.0
}
fn default_context_turns() -> i64 {
    1
}
fn default_main_prompt() -> String {
    "You are the plot planner of an ongoing interactive story. Read the latest story turns, \
the memory tables and your previous plan, then plan what happens in the next reply.\n\n\
Pacing weights (higher = more focus): main plot sulv1, personal threads sulv2, \
romance sulv3, drama sulv4.\n\n\
<memory_tables>\n$5\n</memory_tables>\n\n\
<previous_plot>\n$6\n</previous_plot>"
        .into()
}
fn default_system_prompt() -> String {
    "Answer with a single <plot> block. Inside it, write a <directive> telling the storyteller \
exactly what the next reply must cover. Do not write the story itself."
        .into()
}
fn default_final_directive() -> String {
    DEFAULT_FINAL_DIRECTIVE.into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_mode", &self.api_mode)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("main_prompt", &self.main_prompt)
            .field("system_prompt", &self.system_prompt)
            .field("final_system_directive", &self.final_system_directive)
            .field("rate_main", &self.rate_main)
            .field("rate_personal", &self.rate_personal)
            .field("rate_erotic", &self.rate_erotic)
            .field("rate_cuckold", &self.rate_cuckold)
            .field("context_turn_count", &self.context_turn_count)
            .field("worldbook_enabled", &self.worldbook_enabled)
            .field("extract_tags", &self.extract_tags)
            .finish()
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            api_mode: ApiMode::default(),
            api_url: String::new(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            main_prompt: default_main_prompt(),
            system_prompt: default_system_prompt(),
            final_system_directive: default_final_directive(),
            rate_main: default_rate(),
            rate_personal: default_rate(),
            rate_erotic: default_rate(),
            rate_cuckold: default_rate(),
            context_turn_count: default_context_turns(),
            worldbook_enabled: false,
            extract_tags: String::new(),
        }
    }
}

impl ApiSettings {
    /// Copy a preset's prompt and rate fields over these settings.
    pub fn apply_preset(&mut self, preset: &PromptPreset) {
        self.main_prompt = preset.main_prompt.clone();
        self.system_prompt = preset.system_prompt.clone();
        self.final_system_directive = preset.final_system_directive.clone();
        self.rate_main = preset.rate_main;
        self.rate_personal = preset.rate_personal;
        self.rate_erotic = preset.rate_erotic;
        self.rate_cuckold = preset.rate_cuckold;
    }

    /// The directive to splice in, falling back to the built-in one when empty.
    pub fn final_directive_or_default(&self) -> &str {
        if self.final_system_directive.is_empty() {
            DEFAULT_FINAL_DIRECTIVE
        } else {
            &self.final_system_directive
        }
    }

    /// Whether a planning run can reach a backend at all.
    pub fn has_backend(&self) -> bool {
        self.api_mode == ApiMode::Tavern || !self.api_url.trim().is_empty()
    }
}

impl PromptPreset {
    /// Snapshot the prompt and rate fields of `settings` under `name`.
    pub fn capture(name: impl Into<String>, settings: &ApiSettings) -> Self {
        Self {
            name: name.into(),
            main_prompt: settings.main_prompt.clone(),
            system_prompt: settings.system_prompt.clone(),
            final_system_directive: settings.final_system_directive.clone(),
            rate_main: settings.rate_main,
            rate_personal: settings.rate_personal,
            rate_erotic: settings.rate_erotic,
            rate_cuckold: settings.rate_cuckold,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_length: 0,
            last_used_preset_name: None,
            prompt_presets: Vec::new(),
            api_settings: ApiSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the default path (~/.plotmaster/settings.toml).
    ///
    /// Environment variables override the file:
    /// - `PLOTMASTER_API_KEY`
    /// - `PLOTMASTER_API_URL`
    /// - `PLOTMASTER_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::default_path())
    }

    /// Load `path`, then apply the `PLOTMASTER_*` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut settings = Self::load_from(path)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Load settings from a specific file path (TOML, or JSON by extension).
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No settings file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Write settings to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |reason: String| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
        }

        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?
        } else {
            toml::to_string_pretty(self).map_err(|e| write_err(e.to_string()))?
        };

        std::fs::write(path, content).map_err(|e| write_err(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("PLOTMASTER_API_KEY") {
            self.api_settings.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("PLOTMASTER_API_URL") {
            self.api_settings.api_url = url;
        }
        if let Ok(model) = std::env::var("PLOTMASTER_MODEL") {
            self.api_settings.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".plotmaster")
    }

    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("settings.toml")
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = &self.api_settings;
        if !(0.0..=2.0).contains(&api.temperature) {
            return Err(ConfigError::ValidationError(
                "apiSettings.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if api.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "apiSettings.maxTokens must be > 0".into(),
            ));
        }

        if let Some(name) = &self.last_used_preset_name {
            if !self.prompt_presets.iter().any(|p| &p.name == name) {
                tracing::warn!(preset = %name, "lastUsedPresetName refers to an unknown preset");
            }
        }

        Ok(())
    }

    /// The preset named by `lastUsedPresetName`, if it exists.
    pub fn active_preset(&self) -> Option<&PromptPreset> {
        let name = self.last_used_preset_name.as_deref()?;
        self.prompt_presets.iter().find(|p| p.name == name)
    }

    /// Load the last-used preset into the global API settings.
    ///
    /// Returns `true` when a preset was found and applied.
    pub fn apply_last_used_preset(&mut self) -> bool {
        let Some(preset) = self.active_preset().cloned() else {
            return false;
        };
        tracing::info!(preset = %preset.name, "Applying last used preset");
        self.api_settings.apply_preset(&preset);
        true
    }

    /// Compute the effective API settings for one planning run.
    ///
    /// Precedence, lowest first: defaults (via serde) < global settings <
    /// per-character override < active preset.
    pub fn resolve(&self, character: Option<&ApiSettingsOverride>) -> ApiSettings {
        let mut resolved = self.api_settings.clone();
        if let Some(overrides) = character {
            overrides.apply_to(&mut resolved);
        }
        if let Some(preset) = self.active_preset() {
            tracing::debug!(preset = %preset.name, "Active preset forces prompt fields");
            resolved.apply_preset(preset);
        }
        resolved
    }

    /// Generate a default settings TOML string (for `config init`).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Shared, mutable settings with an optional backing file.
#[derive(Clone)]
pub struct SettingsHandle {
    inner: Arc<RwLock<Settings>>,
    path: Option<PathBuf>,
}

impl SettingsHandle {
    /// A handle that is never written to disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            path: None,
        }
    }

    /// A handle persisted to `path`.
    pub fn with_path(settings: Settings, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            path: Some(path.into()),
        }
    }

    /// Clone the current settings.
    pub fn snapshot(&self) -> Settings {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the settings in place and return the closure's result.
    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        match self.inner.write() {
            Ok(mut guard) => f(&mut *guard),
            Err(poisoned) => {
                let mut guard = poisoned.into_inner();
                f(&mut *guard)
            }
        }
    }

    /// Write the current settings to the backing file, if any.
    pub fn persist(&self) -> Result<(), ConfigError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        self.snapshot().save_to(path)?;
        tracing::debug!(path = %path.display(), "Settings persisted");
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read settings file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse settings file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write settings file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Settings validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preset(name: &str, main: &str) -> PromptPreset {
        PromptPreset {
            name: name.into(),
            main_prompt: main.into(),
            system_prompt: format!("{name} system"),
            final_system_directive: format!("{name} directive"),
            rate_main: 3.0,
            rate_personal: 0.5,
            rate_erotic: 0.0,
            rate_cuckold: 2.0,
        }
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.enabled);
        assert_eq!(settings.min_length, 0);
        assert_eq!(settings.api_settings.context_turn_count, 1);
        assert_eq!(settings.api_settings.api_mode, ApiMode::OpenAi);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn settings_roundtrip_toml() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api_settings.model, settings.api_settings.model);
        assert_eq!(parsed.api_settings.main_prompt, settings.api_settings.main_prompt);
    }

    #[test]
    fn host_json_blob_parses_with_defaults() {
        let json = r#"{
            "enabled": true,
            "minLength": 50,
            "apiSettings": { "apiMode": "tavern", "extractTags": "plot, directive" }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.min_length, 50);
        assert_eq!(settings.api_settings.api_mode, ApiMode::Tavern);
        assert_eq!(settings.api_settings.extract_tags, "plot, directive");
        assert_eq!(settings.api_settings.final_system_directive, DEFAULT_FINAL_DIRECTIVE);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut settings = Settings::default();
        settings.api_settings.temperature = 5.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_settings_file_returns_defaults() {
        let result = Settings::load_from(Path::new("/nonexistent/settings.toml"));
        assert!(result.unwrap().enabled);
    }

    #[test]
    fn save_and_reload_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.min_length = 42;
        settings.prompt_presets.push(preset("noir", "dark"));

        for file in ["settings.toml", "settings.json"] {
            let path = dir.path().join("nested").join(file);
            settings.save_to(&path).unwrap();
            let loaded = Settings::load_from(&path).unwrap();
            assert_eq!(loaded.min_length, 42);
            assert_eq!(loaded.prompt_presets, settings.prompt_presets);
        }
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let mut api = ApiSettings::default();
        api.api_key = Some("sk-secret".into());
        let debug = format!("{api:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn has_backend_requires_url_unless_tavern() {
        let mut api = ApiSettings::default();
        assert!(!api.has_backend());
        api.api_url = "   ".into();
        assert!(!api.has_backend());
        api.api_url = "http://localhost:5000/v1".into();
        assert!(api.has_backend());
        api.api_url.clear();
        api.api_mode = ApiMode::Tavern;
        assert!(api.has_backend());
    }

    #[test]
    fn empty_directive_falls_back() {
        let mut api = ApiSettings::default();
        api.final_system_directive.clear();
        assert_eq!(api.final_directive_or_default(), DEFAULT_FINAL_DIRECTIVE);
        api.final_system_directive = "[custom]".into();
        assert_eq!(api.final_directive_or_default(), "[custom]");
    }

    #[test]
    fn apply_last_used_preset_copies_prompt_fields() {
        let mut settings = Settings::default();
        settings.prompt_presets.push(preset("noir", "dark streets"));
        assert!(!settings.apply_last_used_preset());

        settings.last_used_preset_name = Some("noir".into());
        assert!(settings.apply_last_used_preset());
        assert_eq!(settings.api_settings.main_prompt, "dark streets");
        assert_eq!(settings.api_settings.rate_main, 3.0);

        settings.last_used_preset_name = Some("missing".into());
        assert!(!settings.apply_last_used_preset());
    }

    #[test]
    fn resolve_precedence_global_character_preset() {
        let mut settings = Settings::default();
        settings.api_settings.main_prompt = "global".into();
        settings.api_settings.extract_tags = "plot".into();

        let character = ApiSettingsOverride {
            main_prompt: Some("character".into()),
            context_turn_count: Some(4),
            ..ApiSettingsOverride::default()
        };

        let resolved = settings.resolve(Some(&character));
        assert_eq!(resolved.main_prompt, "character");
        assert_eq!(resolved.context_turn_count, 4);
        assert_eq!(resolved.extract_tags, "plot");

        settings.prompt_presets.push(preset("noir", "preset"));
        settings.last_used_preset_name = Some("noir".into());
        let resolved = settings.resolve(Some(&character));
        assert_eq!(resolved.main_prompt, "preset");
        assert_eq!(resolved.rate_cuckold, 2.0);
        // non-prompt override fields survive the preset
        assert_eq!(resolved.context_turn_count, 4);
    }

    #[test]
    fn handle_update_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let handle = SettingsHandle::with_path(Settings::default(), &path);

        handle.update(|s| s.min_length = 7);
        assert_eq!(handle.snapshot().min_length, 7);
        handle.persist().unwrap();
        assert_eq!(Settings::load_from(&path).unwrap().min_length, 7);

        let memory_only = SettingsHandle::in_memory(Settings::default());
        assert!(memory_only.persist().is_ok());
        assert!(memory_only.path().is_none());
    }
}
