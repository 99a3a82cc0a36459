//! Line-based chat screen.
//!
//! The screen subscribes to the session's stream for its whole lifetime and
//! prints every turn it has not shown yet. Prompts are sent in the
//! background; while one is outstanding further prompts are refused.

use std::error::Error;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ApiError;
use crate::core::message::ChatTurn;
use crate::core::session::{Action, Session};
use crate::core::stream::Snapshot;
use crate::utils::logging::TranscriptLog;

#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput {
    /// Blank line; nothing to do.
    Skip,
    Quit,
    /// `/log` with an optional file name.
    Log(Option<String>),
    Prompt(String),
}

pub fn process_input(input: &str) -> ChatInput {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ChatInput::Skip;
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    match parts.next() {
        Some("/quit") | Some("/exit") => ChatInput::Quit,
        Some("/log") => {
            let file = parts
                .next()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            ChatInput::Log(file)
        }
        _ => ChatInput::Prompt(trimmed.to_string()),
    }
}

/// Tracks how much of the history has already been shown.
#[derive(Debug, Default)]
pub struct ChatView {
    shown: usize,
}

impl ChatView {
    /// Turns of `snapshot` not yet shown, marking them as shown.
    pub fn take_new<'a>(&mut self, snapshot: &'a Snapshot) -> &'a [ChatTurn] {
        let start = self.shown.min(snapshot.len());
        self.shown = snapshot.len();
        &snapshot[start..]
    }
}

pub fn format_turn(turn: &ChatTurn) -> String {
    if turn.is_user() {
        format!("You: {}", turn.text())
    } else {
        format!("palaver: {}", turn.text())
    }
}

fn show_turns(turns: &[ChatTurn], transcript: &TranscriptLog) {
    for turn in turns {
        // The prompt is already on screen as typed.
        if turn.is_assistant() {
            println!("{}\n", format_turn(turn));
        }
        if let Err(err) = transcript.log_turn(turn) {
            eprintln!("⚠️  Transcript write failed: {err}");
        }
    }
}

fn handle_log(transcript: &mut TranscriptLog, file: Option<String>) {
    let result = match file {
        Some(name) => transcript
            .set_log_file(PathBuf::from(name))
            .and_then(|message| transcript.log_session_start().map(|_| message)),
        None => transcript.toggle_logging(),
    };
    match result {
        Ok(message) => eprintln!("{message}"),
        Err(err) => eprintln!("❌ Log error: {err}"),
    }
}

pub async fn run_chat(session: &Session, log: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let mut transcript = TranscriptLog::new(None);
    if let Some(path) = log {
        eprintln!("{}", transcript.set_log_file(path)?);
        transcript.log_session_start()?;
    }

    let (subscription, mut updates) = session.stream().subscribe_channel();
    let mut view = ChatView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            Some(snapshot) = updates.recv() => {
                show_turns(view.take_new(&snapshot), &transcript);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match process_input(&line) {
                    ChatInput::Skip => {}
                    ChatInput::Quit => break,
                    ChatInput::Log(file) => handle_log(&mut transcript, file),
                    ChatInput::Prompt(prompt) => {
                        let Some(guard) = session.try_begin(Action::Chat) else {
                            eprintln!("⏳ {}", ApiError::Busy(Action::Chat.as_str()));
                            continue;
                        };
                        let session = session.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            // Failures are alerted by the session.
                            let _ = session.complete(&prompt).await;
                        });
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    while let Ok(snapshot) = updates.try_recv() {
        show_turns(view.take_new(&snapshot), &transcript);
    }
    Ok(())
}
