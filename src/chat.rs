use crate::completion::CompletionError;
use crate::conversation::{Conversation, Message};
use crate::extract::{self, dotted_extension, Extraction};
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    You,
    Assistant,
    System,
}

impl Sender {
    pub fn label(self) -> &'static str {
        match self {
            Self::You => "You",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub sender: Sender,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub path: PathBuf,
    pub display_name: String,
}

impl Attachment {
    pub fn new(path: PathBuf) -> Self {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, display_name }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Requesting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Blank input, or a request is already in flight.
    Ignored,
    /// The attachment could not be turned into a prompt; a system line was added.
    Rejected,
    /// The user turn was recorded; send this history to the completion endpoint.
    Dispatched(Vec<Message>),
}

pub fn compose_prompt(extension: &str, content: &str, question: &str) -> String {
    format!(
        "I have attached a {extension} file. Here is its content:\n```\n{content}\n```\nNow answer this question: {question}"
    )
}

/// Window-independent chat state: history, transcript, attachment slot and
/// the in-flight request flag.
#[derive(Debug)]
pub struct ChatSession {
    conversation: Conversation,
    transcript: Vec<TranscriptEntry>,
    attachment: Option<Attachment>,
    phase: Phase,
}

impl ChatSession {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            transcript: Vec::new(),
            attachment: None,
            phase: Phase::Idle,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        self.attachment.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_requesting(&self) -> bool {
        self.phase == Phase::Requesting
    }

    pub fn attach(&mut self, path: PathBuf) {
        let attachment = Attachment::new(path);
        info!("attached {}", attachment.path.display());
        self.attachment = Some(attachment);
    }

    pub fn remove_attachment(&mut self) {
        if let Some(previous) = self.attachment.take() {
            info!("removed attachment {}", previous.path.display());
        }
    }

    pub fn push_system(&mut self, body: impl Into<String>) {
        self.push(Sender::System, body);
    }

    fn push(&mut self, sender: Sender, body: impl Into<String>) {
        self.transcript.push(TranscriptEntry {
            sender,
            body: body.into(),
        });
    }

    fn build_prompt(path: &Path, question: &str) -> Result<String, String> {
        match extract::extract(path) {
            Ok(Extraction::Text(content)) => {
                Ok(compose_prompt(&dotted_extension(path), &content, question))
            }
            Ok(Extraction::Unsupported { extension }) => {
                Err(format!("Unsupported file type: {extension}"))
            }
            Err(err) => {
                warn!("attachment extraction failed: {err}");
                Err(err.to_string())
            }
        }
    }

    pub fn submit(&mut self, input: &str) -> Submission {
        let question = input.trim();
        if question.is_empty() || self.is_requesting() {
            return Submission::Ignored;
        }

        let prompt = match &self.attachment {
            Some(attachment) => match Self::build_prompt(&attachment.path, question) {
                Ok(prompt) => prompt,
                Err(message) => {
                    self.push_system(message);
                    return Submission::Rejected;
                }
            },
            None => question.to_string(),
        };

        self.conversation.append_user(prompt);
        self.push(Sender::You, question);
        self.phase = Phase::Requesting;
        Submission::Dispatched(self.conversation.snapshot())
    }

    pub fn finish(&mut self, outcome: Result<String, CompletionError>) {
        self.phase = Phase::Idle;
        match outcome {
            Ok(reply) => {
                self.push(Sender::Assistant, reply.clone());
                self.conversation.append_assistant(reply);
            }
            Err(err) => self.push_system(err.to_string()),
        }
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(Conversation::default())
    }
}
