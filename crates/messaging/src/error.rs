use thiserror::Error;

/// Errors that can occur when talking to the message broker.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The broker could not be reached or refused the connection.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A queue could not be declared.
    #[error("Failed to declare queue '{queue}': {reason}")]
    Declare { queue: String, reason: String },

    /// A message could not be published or the broker rejected it.
    #[error("Publish failed for queue '{queue}': {reason}")]
    Publish { queue: String, reason: String },

    /// A consumer could not be registered.
    #[error("Subscription failed for queue '{queue}': {reason}")]
    Subscribe { queue: String, reason: String },

    /// An ack or nack could not be delivered to the broker.
    #[error("Acknowledgement failed: {0}")]
    Ack(String),

    /// The channel or its delivery stream is closed.
    #[error("Channel closed: {0}")]
    Closed(String),

    /// A payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
