use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    NotEnoughNodes { needed: u32, available: u32 },
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::NotEnoughNodes { needed, available } => write!(
                f,
                "not enough live nodes for placement: needed {needed}, available {available}"
            ),
        }
    }
}

impl std::error::Error for PlacementError {}

impl From<PlacementError> for dstore_types::StoreError {
    fn from(e: PlacementError) -> Self {
        match e {
            PlacementError::NotEnoughNodes { needed, available } => {
                dstore_types::StoreError::NotEnoughNodes { needed, available }
            }
        }
    }
}
