use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{entity} {id} already exists")]
    DuplicateId { entity: &'static str, id: String },
    #[error("chat history {0} does not exist")]
    MissingChatHistory(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("store worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl ChatError {
    pub fn validation(message: impl Into<String>) -> Self {
        ChatError::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation",
            ChatError::Store(_) => "store",
            ChatError::Network(_) => "network",
        }
    }
}
