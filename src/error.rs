use thiserror::Error;

/// Failures the feed surfaces to whoever renders it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The list could not be loaded; replaces the list region.
    #[error("An error has occurred: {0}")]
    Fetch(String),
    /// A create or delete was rejected or never reached the server.
    #[error("{0}")]
    Mutation(String),
    /// No token could be obtained for a mutating call.
    #[error("{0}")]
    Auth(String),
}

impl FeedError {
    pub fn message(&self) -> &str {
        match self {
            FeedError::Fetch(message) | FeedError::Mutation(message) | FeedError::Auth(message) => {
                message
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("comment body is empty")]
    EmptyBody,
    #[error("sign in to comment")]
    SignedOut,
    #[error("comments have not loaded yet")]
    NotReady,
    #[error("a comment is already being sent")]
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteError {
    #[error("comment {0} is not in the feed")]
    UnknownComment(String),
    #[error("not allowed to delete comment {0}")]
    Forbidden(String),
    #[error("comment {0} is already being deleted")]
    InProgress(String),
}
