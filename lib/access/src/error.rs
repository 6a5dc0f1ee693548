//! Error types for the access crate.
//!
//! Only construction and malformed input are errors here; a missing
//! permission, constraint, or attribute is reported as an empty result.
//! Errors are wrapped in rootcause reports at the public API:
//! - `SessionError`: a session could not be built
//! - `ConstraintError`: a constraint was rejected on insertion

use std::fmt;
use tollgate_core::ConstraintId;

/// Errors from building an authorization session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No session ID was supplied, or it was nil.
    MissingSessionId,
    /// No authenticated principal was supplied.
    MissingPrincipal,
    /// The principal's login is empty.
    BlankLogin,
    /// A replicated constraint could not be restored.
    MalformedConstraint { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSessionId => write!(f, "session requires a non-nil session id"),
            Self::MissingPrincipal => write!(f, "session requires an authenticated principal"),
            Self::BlankLogin => write!(f, "principal login must not be blank"),
            Self::MalformedConstraint { reason } => {
                write!(f, "malformed constraint in session: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// Errors from adding a constraint to a constraint index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// The constraint is not bound to an entity.
    MissingEntityName { id: ConstraintId },
}

impl fmt::Display for ConstraintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEntityName { id } => {
                write!(f, "constraint {id} has no entity name")
            }
        }
    }
}

impl std::error::Error for ConstraintError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        assert!(SessionError::MissingSessionId.to_string().contains("session id"));
        assert!(SessionError::MissingPrincipal.to_string().contains("principal"));
        assert!(SessionError::BlankLogin.to_string().contains("login"));
        let err = SessionError::MalformedConstraint {
            reason: "no entity".to_string(),
        };
        assert!(err.to_string().contains("no entity"));
    }

    #[test]
    fn constraint_error_display_names_constraint() {
        let id = ConstraintId::new();
        let err = ConstraintError::MissingEntityName { id };
        assert!(err.to_string().contains(&id.to_string()));
        assert!(err.to_string().contains("no entity name"));
    }
}
