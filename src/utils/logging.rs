use crate::core::message::ChatTurn;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Appends chat turns to a plain-text transcript file.
pub struct TranscriptLog {
    file_path: Option<PathBuf>,
    is_active: bool,
}

impl TranscriptLog {
    pub fn new(log_file: Option<PathBuf>) -> Self {
        let is_active = log_file.is_some();
        TranscriptLog {
            file_path: log_file,
            is_active,
        }
    }

    pub fn set_log_file(&mut self, path: PathBuf) -> Result<String, Box<dyn std::error::Error>> {
        // Fail early if the file cannot be created
        OpenOptions::new().create(true).append(true).open(&path)?;

        let message = format!("Logging enabled to: {}", path.display());
        self.file_path = Some(path);
        self.is_active = true;
        Ok(message)
    }

    pub fn toggle_logging(&mut self) -> Result<String, Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                self.is_active = !self.is_active;
                if self.is_active {
                    Ok(format!("Logging resumed to: {}", path.display()))
                } else {
                    Ok(format!("Logging paused (file: {})", path.display()))
                }
            }
            None => Err("No log file specified. Use --log <filename> to enable logging.".into()),
        }
    }

    /// Write a `## Session started ...` marker line.
    pub fn log_session_start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.write_block(&format!("## Session started {stamp}"))
    }

    pub fn log_turn(&self, turn: &ChatTurn) -> Result<(), Box<dyn std::error::Error>> {
        if turn.is_user() {
            self.write_block(&format!("You: {}", turn.text()))
        } else {
            self.write_block(turn.text())
        }
    }

    fn write_block(&self, content: &str) -> Result<(), Box<dyn std::error::Error>> {
        let Some(file_path) = self.file_path.as_ref().filter(|_| self.is_active) else {
            return Ok(());
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        let mut writer = BufWriter::new(file);

        // Write each line of content, preserving the exact formatting
        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }

        // Blank line between turns, matching the on-screen spacing
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn turns_are_written_with_user_prefix_and_spacing() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.clone()));

        log.log_turn(&ChatTurn::user("hi")).expect("log user");
        log.log_turn(&ChatTurn::assistant("hello\nthere")).expect("log assistant");

        let contents = fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "You: hi\n\nhello\nthere\n\n");
    }

    #[test]
    fn paused_log_writes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let mut log = TranscriptLog::new(None);
        assert!(log.toggle_logging().is_err());

        log.set_log_file(path.clone()).expect("enable");
        log.toggle_logging().expect("pause");
        log.log_turn(&ChatTurn::user("secret")).expect("no-op");

        assert_eq!(fs::read_to_string(&path).expect("read log"), "");
    }

    #[test]
    fn session_marker_is_prefixed() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("chat.log");
        let log = TranscriptLog::new(Some(path.clone()));
        log.log_session_start().expect("marker");

        let contents = fs::read_to_string(&path).expect("read log");
        assert!(contents.starts_with("## Session started "));
    }
}
