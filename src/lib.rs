//! Palaver is a terminal front-end for an OpenAI-compatible API: chat,
//! image generation and audio transcription.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the session: the broadcast message stream, the action
//!   gate, alerts, configuration and the settings view state.
//! - [`auth`] holds the single API key slot and its storage backends.
//! - [`api`] defines the wire payloads and the HTTP client for the three
//!   remote operations.
//! - [`cli`] parses arguments and runs each screen.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod utils;
