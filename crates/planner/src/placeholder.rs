//! Placeholder substitution for prompt templates.
//!
//! Templates may reference `sulv1`..`sulv4` (the four rate parameters), `$5`
//! (the formatted memory tables) and `$6` (the previous plot). Tokens are
//! matched literally and the template is scanned once, left to right, so text
//! inserted for one token is never rescanned for another.

use plotmaster_config::ApiSettings;

pub const TOKEN_RATE_MAIN: &str = "sulv1";
pub const TOKEN_RATE_PERSONAL: &str = "sulv2";
pub const TOKEN_RATE_EROTIC: &str = "sulv3";
pub const TOKEN_RATE_CUCKOLD: &str = "sulv4";
pub const TOKEN_TABLES: &str = "$5";
pub const TOKEN_LAST_PLOT: &str = "$6";

/// Ordered token → value pairs for one planning run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplacementMap {
    entries: Vec<(String, String)>,
}

impl ReplacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard map: rate slots, tables, and previous plot.
    pub fn for_run(api: &ApiSettings, tables: &str, last_plot: &str) -> Self {
        let mut map = Self::new();
        map.insert(TOKEN_RATE_MAIN, api.rate_main.to_string());
        map.insert(TOKEN_RATE_PERSONAL, api.rate_personal.to_string());
        map.insert(TOKEN_RATE_EROTIC, api.rate_erotic.to_string());
        map.insert(TOKEN_RATE_CUCKOLD, api.rate_cuckold.to_string());
        map.insert(TOKEN_TABLES, tables);
        map.insert(TOKEN_LAST_PLOT, last_plot);
        map
    }

    /// Set a token's value, replacing any previous value. Empty tokens are ignored.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            return;
        }
        let value = value.into();
        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((token, value)),
        }
    }

    pub fn get(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every occurrence of every token in `template`.
    ///
    /// At each position the earliest match wins; on a tie the longest token wins.
    pub fn apply(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while !rest.is_empty() {
            let mut best: Option<(usize, &str, &str)> = None;
            for (token, value) in &self.entries {
                let Some(pos) = rest.find(token.as_str()) else {
                    continue;
                };
                let better = match best {
                    None => true,
                    Some((best_pos, best_token, _)) => {
                        pos < best_pos || (pos == best_pos && token.len() > best_token.len())
                    }
                };
                if better {
                    best = Some((pos, token.as_str(), value.as_str()));
                }
            }

            match best {
                Some((pos, token, value)) => {
                    out.push_str(&rest[..pos]);
                    out.push_str(value);
                    rest = &rest[pos + token.len()..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }

        out
    }

    /// Substitute the three template fields of `api` in place.
    pub fn apply_prompts(&self, api: &mut ApiSettings) {
        api.main_prompt = self.apply(&api.main_prompt);
        api.system_prompt = self.apply(&api.system_prompt);
        api.final_system_directive = self.apply(&api.final_system_directive);
    }
}
