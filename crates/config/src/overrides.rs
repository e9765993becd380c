//! Per-character overrides of the API settings.
//!
//! A character card may carry a partial copy of `apiSettings` under the
//! extension's key. Every field is optional; present fields win over the
//! global settings but lose to an active preset.

use serde::{Deserialize, Serialize};
use crate::{ApiMode, ApiSettings};

/// Keys an active preset owns. Stale copies of these on a character card are
/// deleted when a chat is opened.
pub const PROMPT_OVERRIDE_KEYS: [&str; 7] = [
    "mainPrompt",
    "systemPrompt",
    "finalSystemDirective",
    "rateMain",
    "ratePersonal",
    "rateErotic",
    "rateCuckold",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettingsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_mode: Option<ApiMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_system_directive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_main: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_personal: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_erotic: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_cuckold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_turn_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worldbook_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract_tags: Option<String>,
}

impl ApiSettingsOverride {
    /// Parse the override from a character card's extension blob
    /// (`{ "apiSettings": { ... } }`).
    ///
    /// Keys are checked one at a time: a mistyped value is dropped on its own
    /// and numeric strings are accepted where a number is expected. A blob
    /// without an `apiSettings` object yields `None`.
    pub fn from_extension_blob(blob: &serde_json::Value) -> Option<Self> {
        let api = blob.get("apiSettings")?.as_object()?;

        let mut accepted = serde_json::Map::new();
        for (key, value) in api {
            match Self::lenient_field(key, value) {
                Some(value) => {
                    accepted.insert(key.clone(), value);
                }
                None => {
                    tracing::warn!(key = %key, value = %value, "Ignoring malformed character override");
                }
            }
        }

        serde_json::from_value(serde_json::Value::Object(accepted)).ok()
    }

    /// The value to keep for `key`, if it parses on its own (directly or as a
    /// number written as a string).
    fn lenient_field(key: &str, value: &serde_json::Value) -> Option<serde_json::Value> {
        let parses = |candidate: &serde_json::Value| {
            let mut single = serde_json::Map::new();
            single.insert(key.to_string(), candidate.clone());
            serde_json::from_value::<Self>(serde_json::Value::Object(single)).is_ok()
        };

        if parses(value) {
            return Some(value.clone());
        }

        let text = value.as_str()?.trim();
        let number = match text.parse::<i64>() {
            Ok(n) => serde_json::Value::from(n),
            Err(_) => serde_json::Number::from_f64(text.parse::<f64>().ok()?)?.into(),
        };
        parses(&number).then_some(number)
    }

    /// Overlay the present fields onto `base`.
    pub fn apply_to(&self, base: &mut ApiSettings) {
        fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *slot = v.clone();
            }
        }

        set(&mut base.api_mode, &self.api_mode);
        set(&mut base.api_url, &self.api_url);
        set(&mut base.model, &self.model);
        set(&mut base.max_tokens, &self.max_tokens);
        set(&mut base.temperature, &self.temperature);
        set(&mut base.main_prompt, &self.main_prompt);
        set(&mut base.system_prompt, &self.system_prompt);
        set(&mut base.final_system_directive, &self.final_system_directive);
        set(&mut base.rate_main, &self.rate_main);
        set(&mut base.rate_personal, &self.rate_personal);
        set(&mut base.rate_erotic, &self.rate_erotic);
        set(&mut base.rate_cuckold, &self.rate_cuckold);
        set(&mut base.context_turn_count, &self.context_turn_count);
        set(&mut base.worldbook_enabled, &self.worldbook_enabled);
        set(&mut base.extract_tags, &self.extract_tags);
    }
}

/// Remove the preset-owned keys from a character blob's `apiSettings`.
///
/// Returns `true` when at least one key was removed.
pub fn strip_prompt_keys(blob: &mut serde_json::Value) -> bool {
    let Some(api) = blob
        .get_mut("apiSettings")
        .and_then(serde_json::Value::as_object_mut)
    else {
        return false;
    };

    let mut removed = false;
    for key in PROMPT_OVERRIDE_KEYS {
        removed |= api.remove(key).is_some();
    }
    removed
}
