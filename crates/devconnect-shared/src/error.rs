use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Invalid user ID format: {0}")]
    InvalidUserId(String),

    #[error("Invalid conversation ID format: {0}")]
    InvalidConversationId(String),
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed event frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
