//! Config command - update and show persisted settings

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::settings::Settings;

/// Arguments for the config command.
pub struct ConfigArgs {
    pub settings_path: PathBuf,
    pub user_ids: Option<String>,
    pub group_ids: Option<String>,
    pub api_key: Option<String>,
    pub style: Option<String>,
    pub show: bool,
}

impl ConfigArgs {
    fn has_updates(&self) -> bool {
        self.user_ids.is_some()
            || self.group_ids.is_some()
            || self.api_key.is_some()
            || self.style.is_some()
    }
}

/// Copy the given values into `settings`.
pub fn apply(settings: &mut Settings, args: &ConfigArgs) {
    if let Some(user_ids) = &args.user_ids {
        settings.user_ids = user_ids.clone();
    }
    if let Some(group_ids) = &args.group_ids {
        settings.group_ids = group_ids.clone();
    }
    if let Some(api_key) = &args.api_key {
        settings.api_key = api_key.clone();
    }
    if let Some(style) = &args.style {
        // An empty value clears the style.
        settings.style = (!style.is_empty()).then(|| style.clone());
    }
}

/// Execute the config command.
pub fn execute(args: ConfigArgs) -> Result<()> {
    let mut settings = Settings::load_or_default(&args.settings_path)?;

    if args.has_updates() {
        apply(&mut settings, &args);
        settings.save(&args.settings_path)?;
        info!(path = %args.settings_path.display(), "Saved settings");
    }

    if args.show || !args.has_updates() {
        let runtime = tokio::runtime::Runtime::new()?;
        let status = runtime.block_on(super::style_status(settings.style.as_deref()));

        println!("settings:  {}", args.settings_path.display());
        println!("user ids:  {}", settings.user_ids);
        println!("group ids: {}", settings.group_ids);
        println!("api key:   {}", settings.masked_api_key());
        println!(
            "style:     {}",
            settings.style.as_deref().unwrap_or("(none)")
        );
        println!("           {}", status);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConfigArgs {
        ConfigArgs {
            settings_path: PathBuf::from("settings.json"),
            user_ids: None,
            group_ids: None,
            api_key: None,
            style: None,
            show: false,
        }
    }

    #[test]
    fn test_apply_only_given_fields() {
        let mut settings = Settings {
            user_ids: "1".to_string(),
            api_key: "old".to_string(),
            style: Some("a.csl".to_string()),
            ..Default::default()
        };
        let args = ConfigArgs {
            api_key: Some("new".to_string()),
            style: Some(String::new()),
            ..args()
        };

        assert!(args.has_updates());
        apply(&mut settings, &args);

        assert_eq!(settings.user_ids, "1");
        assert_eq!(settings.api_key, "new");
        assert_eq!(settings.style, None);
    }

    #[test]
    fn test_no_updates() {
        assert!(!args().has_updates());
    }
}
