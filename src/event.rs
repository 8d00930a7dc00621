use crate::completion::CompletionError;

#[derive(Debug)]
pub enum AppEvent {
    CompletionFinished(Result<String, CompletionError>),
}
