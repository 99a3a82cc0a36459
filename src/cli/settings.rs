//! Settings screen: the API key slot and configuration values.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::auth::CredentialStore;
use crate::core::config::data::{path_display, Config};
use crate::core::constants::{ACCOUNT_SETTINGS_URL, ACCOUNT_USAGE_URL};
use crate::core::settings::SettingsView;

fn read_key_from_stdin() -> Result<String, Box<dyn Error>> {
    eprint!("Enter your API key: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

/// Store `key`, or a key read from stdin.
pub fn run_auth(store: &CredentialStore, key: Option<String>) -> Result<(), Box<dyn Error>> {
    let key = match key {
        Some(key) => key,
        None => read_key_from_stdin()?,
    };
    save_key(store, &key)
}

pub(crate) fn save_key(store: &CredentialStore, key: &str) -> Result<(), Box<dyn Error>> {
    let key = key.trim();
    if key.is_empty() {
        return Err("No API key provided".into());
    }

    let mut view = SettingsView::load(store);
    view.draft = key.to_string();
    view.save(store)?;
    println!("{}", view.status_line());
    Ok(())
}

/// Sign out: remove the stored key.
pub fn run_deauth(store: &CredentialStore) -> Result<(), Box<dyn Error>> {
    let mut view = SettingsView::load(store);
    view.remove(store)?;
    println!("{}", view.status_line());
    Ok(())
}

pub fn run_status(store: &CredentialStore, config: &Config) -> Result<(), Box<dyn Error>> {
    for line in status_lines(&SettingsView::load(store), store.backend_name(), config) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn status_lines(view: &SettingsView, backend: &str, config: &Config) -> Vec<String> {
    let mut lines = vec![
        view.status_line().to_string(),
        format!("Credential store: {backend}"),
    ];
    if let Ok(path) = Config::get_config_path() {
        lines.push(format!("Config file: {}", path_display(path)));
    }
    lines.push(String::new());
    lines.extend(config.summary_lines());
    lines.push(String::new());
    lines.push(format!("Usage: {ACCOUNT_USAGE_URL}"));
    lines.push(format!("Account settings: {ACCOUNT_SETTINGS_URL}"));
    lines
}

pub fn run_set(key: Option<String>, value: Vec<String>) -> Result<(), Box<dyn Error>> {
    let value = value.join(" ");
    let Some(key) = key.filter(|_| !value.trim().is_empty()) else {
        Config::load()?.print_all();
        return Ok(());
    };

    Config::mutate(|config| config.set_value(&key, &value).map_err(Into::into))?;
    println!("✅ Set {key} to: {}", value.trim());
    Ok(())
}

pub fn run_unset(key: &str) -> Result<(), Box<dyn Error>> {
    Config::mutate(|config| config.unset_value(key).map_err(Into::into))?;
    println!("✅ Unset {key}");
    Ok(())
}
