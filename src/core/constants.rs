//! Shared constants used across the application

/// First turn of every fresh chat history.
pub const GREETING: &str = "Hello, how can i help you today?";

/// Assistant reply used when a completion comes back without content.
pub const FALLBACK_REPLY: &str = "Sorry we have an issue !";

/// Storage key the API key is persisted under, in every credential backend.
pub const STORAGE_API_KEY: &str = "openai_api_key";

/// Service name for the platform keyring.
pub const KEYRING_SERVICE: &str = "palaver";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

pub const ACCOUNT_USAGE_URL: &str = "https://platform.openai.com/account/usage";
pub const ACCOUNT_SETTINGS_URL: &str = "https://platform.openai.com/account/settings";

pub const MISSING_KEY_MESSAGE: &str = "Could not load API key from storage";
