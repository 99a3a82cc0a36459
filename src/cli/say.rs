//! One-shot "say" command

use std::error::Error;

use crate::cli::{join_prompt, Reported};
use crate::core::session::Session;

pub async fn run_say(session: &Session, prompt: Vec<String>) -> Result<(), Box<dyn Error>> {
    let Some(prompt) = join_prompt(&prompt) else {
        return Err("Usage: palaver say <prompt>".into());
    };

    let reply = session.complete(&prompt).await.map_err(Reported)?;
    println!("{reply}");
    Ok(())
}
