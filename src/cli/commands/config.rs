//! Config command - show or initialize configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, DiskConfig};
use crate::error::CacheResult;
use crate::ui::{self, UiContext};

/// Execute the config command
pub async fn execute(args: ConfigArgs, manager: &ConfigManager, config: &Config) -> CacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
    }

    Ok(())
}

fn show_config(config: &Config) -> CacheResult<()> {
    let toml = toml::to_string_pretty(&redacted(config))?;
    println!("{}", toml);
    Ok(())
}

/// Copy of the configuration with disk tokens masked
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    for disk in config.disks.values_mut() {
        if let DiskConfig::Cloud {
            token: Some(token), ..
        } = disk
        {
            *token = "********".to_string();
        }
    }
    config
}

pub async fn init_config(manager: &ConfigManager, force: bool) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_tokens() {
        let mut config = Config::default();
        config.disks.insert(
            "s3".to_string(),
            DiskConfig::Cloud {
                endpoint: "https://bucket.example.org".to_string(),
                token: Some("secret".to_string()),
                timeout_secs: 30,
            },
        );

        let shown = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("********"));
    }
}
