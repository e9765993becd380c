//! `plotmaster preset` — list and switch prompt presets.

use std::path::Path;

use plotmaster_config::Settings;

pub fn list(settings_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::load_from(settings_path)?;
    if settings.prompt_presets.is_empty() {
        println!("No presets saved.");
        return Ok(());
    }

    let active = settings.last_used_preset_name.as_deref();
    for preset in &settings.prompt_presets {
        let marker = if Some(preset.name.as_str()) == active { "*" } else { " " };
        println!(
            "{marker} {}  (rates {}/{}/{}/{})",
            preset.name, preset.rate_main, preset.rate_personal, preset.rate_erotic, preset.rate_cuckold
        );
    }
    Ok(())
}

/// Select `name`, copy it into the global settings, and save.
pub fn use_preset(settings_path: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load_from(settings_path)?;
    select(&mut settings, name)?;
    settings.save_to(settings_path)?;
    println!("✅ Preset '{name}' is now active");
    Ok(())
}

fn select(settings: &mut Settings, name: &str) -> Result<(), String> {
    if !settings.prompt_presets.iter().any(|p| p.name == name) {
        let known: Vec<&str> = settings.prompt_presets.iter().map(|p| p.name.as_str()).collect();
        return Err(format!("Unknown preset '{name}' (known: {})", known.join(", ")));
    }
    settings.last_used_preset_name = Some(name.to_string());
    settings.apply_last_used_preset();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotmaster_config::PromptPreset;

    #[test]
    fn select_applies_preset_fields() {
        let mut settings = Settings::default();
        let mut preset = PromptPreset::capture("gothic", &settings.api_settings);
        preset.main_prompt = "gothic main".into();
        settings.prompt_presets.push(preset);

        select(&mut settings, "gothic").unwrap();
        assert_eq!(settings.last_used_preset_name.as_deref(), Some("gothic"));
        assert_eq!(settings.api_settings.main_prompt, "gothic main");
    }

    #[test]
    fn select_rejects_unknown_preset() {
        let mut settings = Settings::default();
        assert!(select(&mut settings, "missing").is_err());
        assert!(settings.last_used_preset_name.is_none());
    }

    #[test]
    fn use_preset_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut settings = Settings::default();
        settings.prompt_presets.push(PromptPreset::capture("a", &settings.api_settings));
        settings.save_to(&path).unwrap();

        use_preset(&path, "a").unwrap();
        let saved = Settings::load_from(&path).unwrap();
        assert_eq!(saved.last_used_preset_name.as_deref(), Some("a"));
    }
}
