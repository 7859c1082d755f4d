use thiserror::Error;

use super::config::ConfigError;
use crate::core::constraints::ConstraintError;
use crate::core::energy::{IncompleteModel, ParamLoadError};
use crate::core::sequence::SequenceError;
use crate::core::structure::StructureError;

#[derive(Debug, Error)]
pub enum FoldError {
    #[error("Invalid sequence: {0}")]
    InvalidSequence(#[from] SequenceError),

    #[error("Incomplete energy model: {0}")]
    IncompleteEnergyModel(#[from] IncompleteModel),

    #[error("Failed to load energy parameters: {0}")]
    ParamLoad(#[from] ParamLoadError),

    #[error("Constraint conflict: {0}")]
    ConstraintConflict(String),

    #[error("Invalid constraint: {0}")]
    InvalidConstraint(ConstraintError),

    #[error("Sequence of length {length} exceeds the configured maximum of {max}")]
    SequenceTooLong { length: usize, max: usize },

    #[error("Partition function could not be kept in range after {attempts} rescaling attempts")]
    NumericOverflow { attempts: usize },

    #[error("Invalid structure: {0}")]
    InvalidStructure(#[from] StructureError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<ConstraintError> for FoldError {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::Conflict(reason) => FoldError::ConstraintConflict(reason),
            other => FoldError::InvalidConstraint(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_conflicts_are_promoted() {
        let err: FoldError = ConstraintError::Conflict("position 3".to_string()).into();
        assert!(matches!(err, FoldError::ConstraintConflict(ref r) if r == "position 3"));

        let err: FoldError = ConstraintError::Unbalanced { position: 2 }.into();
        assert!(matches!(
            err,
            FoldError::InvalidConstraint(ConstraintError::Unbalanced { position: 2 })
        ));
    }

    #[test]
    fn sequence_errors_convert_with_question_mark() {
        fn parse() -> Result<(), FoldError> {
            crate::core::sequence::Sequence::parse("")?;
            Ok(())
        }
        assert!(matches!(parse(), Err(FoldError::InvalidSequence(SequenceError::Empty))));
    }
}
