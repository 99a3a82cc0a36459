use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::constants::{
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_SIZE, DEFAULT_TRANSCRIPTION_MODEL,
};
use crate::utils::url::normalize_base_url;

/// Where the API key is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreKind {
    #[default]
    Keyring,
    File,
}

impl CredentialStoreKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialStoreKind::Keyring => "keyring",
            CredentialStoreKind::File => "file",
        }
    }
}

impl fmt::Display for CredentialStoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialStoreKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(CredentialStoreKind::Keyring),
            "file" => Ok(CredentialStoreKind::File),
            other => Err(format!(
                "unknown credential store '{other}' (expected keyring or file)"
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the OpenAI-compatible API (e.g., "https://api.openai.com/v1")
    pub base_url: Option<String>,
    /// Model used for chat completions
    pub chat_model: Option<String>,
    /// Resolution requested from the image endpoint (e.g., "1024x1024")
    pub image_size: Option<String>,
    /// Model used for audio transcription
    pub transcription_model: Option<String>,
    /// Backend holding the API key
    pub credential_store: Option<CredentialStoreKind>,
}

/// Keys accepted by `palaver set` / `palaver unset`.
pub const CONFIG_KEYS: &[&str] = &[
    "base-url",
    "chat-model",
    "image-size",
    "transcription-model",
    "credential-store",
];

impl Config {
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .map(normalize_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn image_size(&self) -> &str {
        self.image_size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE)
    }

    pub fn transcription_model(&self) -> &str {
        self.transcription_model
            .as_deref()
            .unwrap_or(DEFAULT_TRANSCRIPTION_MODEL)
    }

    pub fn credential_store(&self) -> CredentialStoreKind {
        self.credential_store.unwrap_or_default()
    }

    /// Apply a `set <key> <value>` request.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        if value.is_empty() {
            return Err(format!("A value is required for {key}"));
        }
        match key {
            "base-url" => self.base_url = Some(normalize_base_url(value)),
            "chat-model" => self.chat_model = Some(value.to_string()),
            "image-size" => {
                if !is_valid_image_size(value) {
                    return Err(format!(
                        "Invalid image size '{value}' (expected WIDTHxHEIGHT, e.g. 1024x1024)"
                    ));
                }
                self.image_size = Some(value.to_string());
            }
            "transcription-model" => self.transcription_model = Some(value.to_string()),
            "credential-store" => self.credential_store = Some(value.parse()?),
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Apply an `unset <key>` request.
    pub fn unset_value(&mut self, key: &str) -> Result<(), String> {
        match key {
            "base-url" => self.base_url = None,
            "chat-model" => self.chat_model = None,
            "image-size" => self.image_size = None,
            "transcription-model" => self.transcription_model = None,
            "credential-store" => self.credential_store = None,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }
}

fn unknown_key(key: &str) -> String {
    format!(
        "Unknown config key: {key} (expected one of: {})",
        CONFIG_KEYS.join(", ")
    )
}

fn is_valid_image_size(value: &str) -> bool {
    match value.split_once('x') {
        Some((width, height)) => {
            width.parse::<u32>().is_ok_and(|w| w > 0) && height.parse::<u32>().is_ok_and(|h| h > 0)
        }
        None => false,
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/palaver/config.toml` → `~/.config/palaver/config.toml`
/// - Windows: paths are shown unchanged
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
