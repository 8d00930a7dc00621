use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant. When users attach files, \
carefully analyze the content and answer questions based on it. \
Always reference specific parts of the document when possible.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Append-only chat history sent in full with every completion request.
///
/// The first entry is always the system instruction given to [`Conversation::new`].
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let mut conversation = Self {
            messages: Vec::new(),
        };
        conversation.append_system(system_prompt);
        conversation
    }

    fn append_system(&mut self, text: impl Into<String>) {
        self.messages.push(Message::new(Role::System, text));
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::new(Role::User, text));
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::new(Role::Assistant, text));
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT)
    }
}
