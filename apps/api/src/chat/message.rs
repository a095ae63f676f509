use serde::{Deserialize, Serialize};

/// Fixed reply substituted for the assistant turn when the backend fails.
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error. Please try again.";

/// Who authored a chat message.
///
/// The assistant serializes as `model`, the name both the vendor API and the
/// proxy contract use; `assistant` is accepted on input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "model", alias = "assistant")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assistant_serializes_as_model() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"model","text":"hi"}"#);
    }

    #[test]
    fn test_assistant_alias_accepted() {
        let message: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","text":"hi"}"#).unwrap();
        assert_eq!(message.role, Role::Assistant);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"system","text":"x"}"#);
        assert!(result.is_err());
    }
}
