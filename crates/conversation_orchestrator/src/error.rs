use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("message content is empty")]
    EmptyMessageContent,

    /// One generation per conversation at a time; callers must wait for the
    /// running one to finish or cancel it.
    #[error("a generation is already in progress")]
    GenerationInProgress,
}
