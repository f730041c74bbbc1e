//! Errors produced by an [`Action`](crate::Action)

use thiserror::Error;

/// Failure of a single execution attempt.
///
/// Every stream an action hands out uses this as its error type. There is no
/// retry logic here: callers that want another attempt call `apply` again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError<E> {
    /// The attempt was rejected because the action was not enabled.
    #[error("action is disabled")]
    Disabled,
    /// The unit of work started by the attempt failed.
    #[error("action execution failed: {0}")]
    ExecutionFailed(E),
}

impl<E> ActionError<E> {
    /// Whether the attempt was rejected without running.
    pub fn is_disabled(&self) -> bool {
        matches!(self, ActionError::Disabled)
    }

    /// The unit of work's own error, if it failed.
    pub fn execution_error(&self) -> Option<&E> {
        match self {
            ActionError::ExecutionFailed(error) => Some(error),
            ActionError::Disabled => None,
        }
    }

    /// Consume the error, returning the unit of work's own error if any.
    pub fn into_execution_error(self) -> Option<E> {
        match self {
            ActionError::ExecutionFailed(error) => Some(error),
            ActionError::Disabled => None,
        }
    }

    /// Transform the wrapped execution error.
    pub fn map<F>(self, f: impl FnOnce(E) -> F) -> ActionError<F> {
        match self {
            ActionError::Disabled => ActionError::Disabled,
            ActionError::ExecutionFailed(error) => ActionError::ExecutionFailed(f(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Error)]
    #[error("network unreachable")]
    struct NetworkError;

    #[test]
    fn test_display() {
        assert_eq!(
            ActionError::<NetworkError>::Disabled.to_string(),
            "action is disabled"
        );
        assert_eq!(
            ActionError::ExecutionFailed(NetworkError).to_string(),
            "action execution failed: network unreachable"
        );
    }

    #[test]
    fn test_accessors() {
        let disabled: ActionError<NetworkError> = ActionError::Disabled;
        assert!(disabled.is_disabled());
        assert_eq!(disabled.execution_error(), None);

        let failed = ActionError::ExecutionFailed(NetworkError);
        assert!(!failed.is_disabled());
        assert_eq!(failed.execution_error(), Some(&NetworkError));
        assert_eq!(failed.into_execution_error(), Some(NetworkError));
    }

    #[test]
    fn test_map() {
        let failed: ActionError<i32> = ActionError::ExecutionFailed(2);
        assert_eq!(failed.map(|e| e * 2), ActionError::ExecutionFailed(4));
        assert_eq!(
            ActionError::<i32>::Disabled.map(|e| e.to_string()),
            ActionError::Disabled
        );
    }

    #[test]
    fn test_is_std_error() {
        fn assert_error<T: std::error::Error>(_: &T) {}
        assert_error(&ActionError::ExecutionFailed(NetworkError));
    }
}
