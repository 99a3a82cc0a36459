pub mod alert;
pub mod config;
pub mod constants;
pub mod message;
pub mod session;
pub mod settings;
pub mod stream;
