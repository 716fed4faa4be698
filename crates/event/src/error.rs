//! Error types for pending-batch transitions.

use core::fmt;

/// Result type alias for emitter operations.
pub type Result<T> = core::result::Result<T, TransitionError>;

/// An invalid classification transition within one pending batch.
///
/// Each variant signals caller misuse of the mutation contract: the same key
/// was pushed through a sequence of raw events that has no coherent net
/// classification. These are fatal to the call and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// An add for a key already pending as added or updated in this batch.
    DuplicateAdd,
    /// An update for a key already slated for removal in this batch.
    UpdateAfterRemove,
    /// A remove for a key already slated for removal in this batch.
    DuplicateRemove,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::DuplicateAdd => {
                write!(f, "duplicate add for a key already pending in this batch")
            }
            TransitionError::UpdateAfterRemove => {
                write!(f, "update for a key already slated for removal in this batch")
            }
            TransitionError::DuplicateRemove => {
                write!(f, "duplicate remove for a key already pending in this batch")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert!(TransitionError::DuplicateAdd.to_string().contains("duplicate add"));
        assert!(TransitionError::UpdateAfterRemove.to_string().contains("removal"));
        assert!(TransitionError::DuplicateRemove.to_string().contains("duplicate remove"));
    }
}
