use crate::auth::{CredentialError, CredentialStore};

/// Local state of the settings screen: whether a key is stored and the text
/// in the key field.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SettingsView {
    pub has_key: bool,
    pub draft: String,
}

impl SettingsView {
    /// Build the view from whatever the store holds right now.
    pub fn load(store: &CredentialStore) -> Self {
        let mut view = Self::default();
        view.refresh(store);
        view
    }

    /// Re-read the store. Called every time the screen is shown.
    pub fn refresh(&mut self, store: &CredentialStore) {
        match store.get() {
            Some(credential) => {
                self.has_key = true;
                self.draft = credential.expose().to_string();
            }
            None => {
                self.has_key = false;
                self.draft.clear();
            }
        }
    }

    /// Persist the draft. `has_key` only flips once the store has accepted it.
    pub fn save(&mut self, store: &CredentialStore) -> Result<(), CredentialError> {
        store.set(&self.draft)?;
        self.has_key = true;
        Ok(())
    }

    /// Remove the stored key. On failure the view is left as it was.
    pub fn remove(&mut self, store: &CredentialStore) -> Result<(), CredentialError> {
        store.remove()?;
        self.has_key = false;
        self.draft.clear();
        Ok(())
    }

    /// Headline shown above the key field.
    pub fn status_line(&self) -> &'static str {
        if self.has_key {
            "You are all set !"
        } else {
            "No API key stored"
        }
    }
}
