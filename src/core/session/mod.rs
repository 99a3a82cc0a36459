//! One running front-end session.
//!
//! A [`Session`] owns the conversation stream and ties it to the credential
//! store and the API client. Every remote action reads the key first; with no
//! key the user is alerted and nothing goes over the network.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::auth::{Credential, CredentialStore};
use crate::core::alert::{Alert, AlertSink};
use crate::core::config::data::Config;
use crate::core::constants::FALLBACK_REPLY;
use crate::core::message::ChatTurn;
use crate::core::stream::{MessageStream, Snapshot};


/// The user-triggered remote actions a screen can have in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Chat,
    Image,
    Transcription,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Chat => "chat",
            Action::Image => "image",
            Action::Transcription => "transcription",
        }
    }

    fn slot(self) -> usize {
        match self {
            Action::Chat => 0,
            Action::Image => 1,
            Action::Transcription => 2,
        }
    }
}

#[derive(Default)]
struct ActionGate {
    busy: [AtomicBool; 3],
}

/// Marks an action as in flight until dropped.
pub struct ActionGuard {
    gate: Arc<ActionGate>,
    action: Action,
}

impl ActionGuard {
    pub fn action(&self) -> Action {
        self.action
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.gate.busy[self.action.slot()].store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct Session {
    stream: MessageStream,
    credentials: CredentialStore,
    client: ApiClient,
    alerts: Arc<dyn AlertSink>,
    gate: Arc<ActionGate>,
    next_request_id: Arc<AtomicU64>,
}

impl Session {
    pub fn new(credentials: CredentialStore, client: ApiClient, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            stream: MessageStream::new(),
            credentials,
            client,
            alerts,
            gate: Arc::new(ActionGate::default()),
            next_request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn from_config(config: &Config, alerts: Arc<dyn AlertSink>) -> Self {
        let credentials = CredentialStore::from_config(config, alerts.clone());
        Self::new(credentials, ApiClient::from_config(config), alerts)
    }

    pub fn stream(&self) -> &MessageStream {
        &self.stream
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Claim `action` for the caller. Returns `None` while another call for
    /// the same action is outstanding; the caller should drop the request.
    pub fn try_begin(&self, action: Action) -> Option<ActionGuard> {
        let claimed = self.gate.busy[action.slot()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !claimed {
            debug!(action = action.as_str(), "action already in flight");
            return None;
        }
        Some(ActionGuard {
            gate: self.gate.clone(),
            action,
        })
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.gate.busy[action.slot()].load(Ordering::Acquire)
    }

    /// Echo the user's prompt into the conversation.
    pub fn publish_local(&self, prompt: &str) -> Snapshot {
        self.stream.append(ChatTurn::user(prompt))
    }

    /// Record the assistant's reply. Blank or missing content becomes the
    /// fallback reply. Returns the text that was recorded.
    pub fn publish_remote_result(&self, reply: Option<&str>) -> String {
        let text = reply
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(FALLBACK_REPLY)
            .to_string();
        self.stream.append(ChatTurn::assistant(text.clone()));
        text
    }

    /// Send `prompt` for a chat completion.
    ///
    /// The user turn is published before the request goes out and stays in
    /// the history if the request fails.
    pub async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let credential = self.credential()?;
        let request_id = self.next_request_id();

        let snapshot = self.publish_local(prompt);
        debug!(request_id, turns = snapshot.len(), "chat completion requested");

        match self.client.create_completion(&credential, prompt).await {
            Ok(reply) => {
                let text = self.publish_remote_result(reply.as_deref());
                info!(request_id, "chat completion received");
                Ok(text)
            }
            Err(err) => Err(self.report(request_id, Action::Chat, err)),
        }
    }

    /// Generate one image for `prompt` and return its URL.
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ApiError> {
        let credential = self.credential()?;
        let request_id = self.next_request_id();
        debug!(request_id, "image generation requested");

        match self.client.generate_image(&credential, prompt).await {
            Ok(url) => {
                info!(request_id, "image generated");
                Ok(url)
            }
            Err(err) => Err(self.report(request_id, Action::Image, err)),
        }
    }

    /// Transcribe the audio file at `path`.
    pub async fn transcribe_audio(&self, path: &Path) -> Result<String, ApiError> {
        let credential = self.credential()?;
        let request_id = self.next_request_id();
        debug!(request_id, path = %path.display(), "transcription requested");

        match self.client.transcribe_file(&credential, path).await {
            Ok(text) => {
                info!(request_id, chars = text.chars().count(), "transcription received");
                Ok(text)
            }
            Err(err) => Err(self.report(request_id, Action::Transcription, err)),
        }
    }

    fn credential(&self) -> Result<Credential, ApiError> {
        self.credentials.require().ok_or(ApiError::MissingCredential)
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    fn report(&self, request_id: u64, action: Action, err: ApiError) -> ApiError {
        warn!(request_id, action = action.as_str(), "request failed: {err}");
        self.alerts.show(Alert::error(err.to_string()));
        err
    }
}
