pub mod data;
pub mod io;
pub mod orchestrator;
pub mod printing;


pub use data::{Config, CredentialStoreKind};
pub use io::{ConfigError, CONFIG_DIR_ENV};
