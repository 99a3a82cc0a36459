use crate::core::config::data::Config;

impl Config {
    /// Lines shown by `palaver set` without arguments.
    pub fn summary_lines(&self) -> Vec<String> {
        fn show(value: &Option<String>, default: &str) -> String {
            match value {
                Some(value) => value.clone(),
                None => format!("{default} (default)"),
            }
        }

        vec![
            "Current configuration:".to_string(),
            format!("  base-url: {}", show(&self.base_url, &self.base_url())),
            format!("  chat-model: {}", show(&self.chat_model, self.chat_model())),
            format!("  image-size: {}", show(&self.image_size, self.image_size())),
            format!(
                "  transcription-model: {}",
                show(&self.transcription_model, self.transcription_model())
            ),
            format!(
                "  credential-store: {}",
                match self.credential_store {
                    Some(kind) => kind.to_string(),
                    None => format!("{} (default)", self.credential_store()),
                }
            ),
        ]
    }

    pub fn print_all(&self) {
        for line in self.summary_lines() {
            println!("{line}");
        }
    }
}
