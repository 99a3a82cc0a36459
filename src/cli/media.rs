//! Image generation and transcription screens.

use std::error::Error;
use std::path::Path;

use crate::api::ApiError;
use crate::cli::{join_prompt, Reported};
use crate::core::session::{Action, Session};

pub async fn run_image(session: &Session, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let Some(prompt) = join_prompt(&prompt) else {
        return Err("Usage: palaver image <prompt>".into());
    };

    let Some(_guard) = session.try_begin(Action::Image) else {
        return Err(ApiError::Busy(Action::Image.as_str()).into());
    };
    eprintln!("🎨 Generating image...");
    let url = session.generate_image(&prompt).await.map_err(Reported)?;
    println!("{url}");
    Ok(())
}

pub async fn run_transcribe(session: &Session, path: &Path) -> Result<(), Box<dyn Error>> {
    if !path.is_file() {
        return Err(format!("No audio file at {}", path.display()).into());
    }

    let Some(_guard) = session.try_begin(Action::Transcription) else {
        return Err(ApiError::Busy(Action::Transcription.as_str()).into());
    };
    eprintln!("🎙️  Transcribing {}...", path.display());
    let text = session.transcribe_audio(path).await.map_err(Reported)?;
    println!("{text}");
    Ok(())
}
