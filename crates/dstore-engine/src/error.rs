use std::fmt;

use dstore_nodeclient::NodeClientError;
use dstore_placement::PlacementError;
use dstore_types::StoreError;

#[derive(Debug)]
pub enum EngineError {
    Store(StoreError),
    Placement(PlacementError),
    NodeClient(NodeClientError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Store(e) => write!(f, "{e}"),
            EngineError::Placement(e) => write!(f, "{e}"),
            EngineError::NodeClient(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

impl From<PlacementError> for EngineError {
    fn from(e: PlacementError) -> Self {
        EngineError::Placement(e)
    }
}

impl From<NodeClientError> for EngineError {
    fn from(e: NodeClientError) -> Self {
        EngineError::NodeClient(e)
    }
}
