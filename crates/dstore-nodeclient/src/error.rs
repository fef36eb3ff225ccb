use std::fmt;

#[derive(Debug)]
pub enum NodeClientError {
    /// The node returned a non-2xx status.
    Status { context: String, status: u16 },
    /// The request could not be sent, or the response body could not be read.
    Transport { context: String, reason: String },
}

impl fmt::Display for NodeClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeClientError::Status { context, status } => {
                write!(f, "{context} returned status {status}")
            }
            NodeClientError::Transport { context, reason } => {
                write!(f, "{context} failed: {reason}")
            }
        }
    }
}

impl std::error::Error for NodeClientError {}

impl NodeClientError {
    pub fn from_reqwest(e: reqwest::Error, context: &str) -> Self {
        NodeClientError::Transport {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<NodeClientError> for dstore_types::StoreError {
    fn from(e: NodeClientError) -> Self {
        match e {
            NodeClientError::Status { context, status } => dstore_types::StoreError::Transport {
                context,
                reason: format!("status {status}"),
            },
            NodeClientError::Transport { context, reason } => {
                dstore_types::StoreError::Transport { context, reason }
            }
        }
    }
}
