//! ---
//! rda_section: "05-networking-external-interfaces"
//! rda_subsection: "binary"
//! rda_type: "source"
//! rda_scope: "code"
//! rda_description: "Control CLI for administrators managing dashboard access."
//! rda_version: "v0.1.0"
//! rda_owner: "tbd"
//! ---
use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use rda_api::{open_store, Runtime};
use rda_settings::{activate, migrate_legacy_settings, MigrationOutcome, SettingField};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::GlobalOptions;

/// Settings management commands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the current snapshot and effective capability.
    Show,
    /// Print the raw values shown in the debug panel.
    Debug,
    /// Overwrite the stored settings with the activation defaults.
    Activate,
    /// Convert a legacy `rda-settings` record, if present.
    Migrate,
    /// Run submitted values through the save pipeline.
    Save(SaveArgs),
    /// List the role aliases and every capability selectable as a custom capability.
    Capabilities,
    /// Render the login screen message.
    LoginMessage,
}

/// Values to save, as `field=value` pairs.
#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Field assignment such as `access_switch=capability`; repeat per field.
    /// Fields that are not given are saved as empty values.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub assignments: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SnapshotView<'a> {
    capability: String,
    settings: &'a rda_settings::Settings,
}

pub fn run(command: SettingsCommand, global: &GlobalOptions) -> Result<()> {
    let config = global.load_config()?;
    match command {
        SettingsCommand::Activate => {
            let store = open_store(&config.store)?;
            let settings = activate(store.as_ref(), &config.site.home_url)
                .context("failed to write activation defaults")?;
            print_json(&settings)?;
        }
        SettingsCommand::Migrate => {
            let store = open_store(&config.store)?;
            match migrate_legacy_settings(store.as_ref(), &config.site.home_url)? {
                MigrationOutcome::NotNeeded => println!("No legacy settings found"),
                MigrationOutcome::Discarded => println!("Malformed legacy settings removed"),
                MigrationOutcome::Migrated(settings) => {
                    println!("Legacy settings migrated");
                    print_json(&settings)?;
                }
            }
        }
        SettingsCommand::Show => {
            let runtime = Runtime::from_config(&config)?;
            let snapshot = runtime.resolver.snapshot();
            print_json(&SnapshotView {
                capability: runtime.resolver.capability(),
                settings: &snapshot,
            })?;
        }
        SettingsCommand::Debug => {
            let runtime = Runtime::from_config(&config)?;
            for (key, value) in runtime.resolver.debug_rows() {
                println!("{key:<16} {value}");
            }
        }
        SettingsCommand::Save(args) => {
            let submitted = parse_assignments(&args.assignments)?;
            let runtime = Runtime::from_config(&config)?;
            let settings = runtime.resolver.save(&submitted)?;
            print_json(&SnapshotView {
                capability: runtime.resolver.capability(),
                settings: &settings,
            })?;
        }
        SettingsCommand::Capabilities => {
            let runtime = Runtime::from_config(&config)?;
            for (alias, capability) in runtime.resolver.aliases().entries() {
                println!("{:<8} {capability}", alias.as_str());
            }
            for capability in runtime.roles.available_capabilities() {
                println!("{capability}");
            }
        }
        SettingsCommand::LoginMessage => {
            let runtime = Runtime::from_config(&config)?;
            println!("{}", runtime.resolver.login_message(""));
        }
    }
    Ok(())
}

/// Turn `field=value` pairs into a submitted form keyed by option name.
fn parse_assignments(assignments: &[String]) -> Result<Map<String, Value>> {
    let mut submitted = Map::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{assignment}'"))?;
        let field = SettingField::ALL
            .into_iter()
            .find(|field| field.name() == name || field.option_key() == name)
            .ok_or_else(|| anyhow!("unknown settings field '{name}'"))?;
        submitted.insert(field.option_key().to_owned(), Value::String(value.to_owned()));
    }
    Ok(submitted)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to render output")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_accept_short_and_option_names() {
        let submitted = parse_assignments(&[
            "access_switch=capability".to_owned(),
            "rda_access_cap=manage_woocommerce".to_owned(),
            "login_message=a=b".to_owned(),
        ])
        .unwrap();
        assert_eq!(submitted["rda_access_switch"], "capability");
        assert_eq!(submitted["rda_access_cap"], "manage_woocommerce");
        assert_eq!(submitted["rda_login_message"], "a=b");
    }

    #[test]
    fn assignments_reject_unknown_fields() {
        assert!(parse_assignments(&["colour=blue".to_owned()]).is_err());
        assert!(parse_assignments(&["access_switch".to_owned()]).is_err());
    }
}
