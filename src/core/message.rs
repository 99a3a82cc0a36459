use serde::{Deserialize, Serialize};

/// Who authored a turn in the chat history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Origin {
    User,
    Assistant,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Origin::User => "user",
            Origin::Assistant => "assistant",
        }
    }

    /// Role name used on the chat completion wire format.
    pub fn to_api_role(self) -> &'static str {
        self.as_str()
    }

    pub fn is_user(self) -> bool {
        self == Origin::User
    }

    pub fn is_assistant(self) -> bool {
        self == Origin::Assistant
    }
}

impl AsRef<str> for Origin {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<&str> for Origin {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Origin::User),
            "assistant" => Ok(Origin::Assistant),
            _ => Err(format!("invalid turn origin: {value}")),
        }
    }
}

impl TryFrom<String> for Origin {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Origin> for String {
    fn from(value: Origin) -> Self {
        value.as_str().to_string()
    }
}

/// One message in the chat history. Turns are never edited after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    text: String,
    origin: Origin,
}

impl ChatTurn {
    pub fn new(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Origin::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Origin::Assistant, text)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_user(&self) -> bool {
        self.origin.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.origin.is_assistant()
    }
}
