//! `plotmaster config` — Settings file management commands.

use std::path::Path;

use plotmaster_config::Settings;

pub fn show(settings_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = Settings::load_with_env(settings_path)
        .map_err(|e| format!("Failed to load settings: {e}"))?;
    if settings.api_settings.api_key.is_some() {
        settings.api_settings.api_key = Some("[redacted]".into());
    }

    let mut warnings = Vec::new();
    if !settings.api_settings.has_backend() {
        warnings.push("No API URL set (set PLOTMASTER_API_URL or apiUrl)".to_string());
    }
    if let Some(name) = &settings.last_used_preset_name {
        if settings.active_preset().is_none() {
            warnings.push(format!("Last used preset '{name}' does not exist"));
        }
    }

    println!("{}", toml::to_string_pretty(&settings)?);
    for w in &warnings {
        eprintln!("   ⚠️  {w}");
    }
    Ok(())
}

pub fn init(settings_path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if settings_path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            settings_path.display()
        )
        .into());
    }
    if let Some(parent) = settings_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(settings_path, Settings::default_toml())?;
    println!("✅ Wrote default settings to {}", settings_path.display());
    Ok(())
}

pub fn path(settings_path: &Path) {
    println!("{}", settings_path.display());
}
