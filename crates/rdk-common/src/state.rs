//! State transition rules

use crate::action::UserActionStatus;

/// State transition Error
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Already completed
    #[error("Action already completed")]
    AlreadyCompleted,
    /// Already claimed
    #[error("Reward already claimed")]
    AlreadyClaimed,
    /// Invalid transition
    #[error("Invalid transition: From {0} to {1}")]
    InvalidTransition(UserActionStatus, UserActionStatus),
}

#[inline]
/// Check if the user action state transition is allowed
///
/// Valid transitions:
/// - NotStarted -> InProgress, Completed
/// - InProgress -> Completed
/// - Completed -> (no transitions allowed)
pub fn check_user_action_transition(
    current_state: UserActionStatus,
    new_state: UserActionStatus,
) -> Result<(), Error> {
    let is_valid_transition = match current_state {
        UserActionStatus::NotStarted => matches!(
            new_state,
            UserActionStatus::InProgress | UserActionStatus::Completed
        ),
        UserActionStatus::InProgress => matches!(new_state, UserActionStatus::Completed),
        UserActionStatus::Completed => false,
    };

    if !is_valid_transition {
        Err(match current_state {
            UserActionStatus::Completed => Error::AlreadyCompleted,
            _ => Error::InvalidTransition(current_state, new_state),
        })
    } else {
        Ok(())
    }
}

#[inline]
/// Check if a reward can be claimed
pub fn check_reward_claim(claimed: bool) -> Result<(), Error> {
    if claimed {
        Err(Error::AlreadyClaimed)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use UserActionStatus::*;

        assert!(check_user_action_transition(NotStarted, InProgress).is_ok());
        assert!(check_user_action_transition(NotStarted, Completed).is_ok());
        assert!(check_user_action_transition(InProgress, Completed).is_ok());
    }

    #[test]
    fn test_never_regresses() {
        use UserActionStatus::*;

        assert_eq!(
            check_user_action_transition(Completed, InProgress),
            Err(Error::AlreadyCompleted)
        );
        assert_eq!(
            check_user_action_transition(Completed, Completed),
            Err(Error::AlreadyCompleted)
        );
        assert_eq!(
            check_user_action_transition(InProgress, NotStarted),
            Err(Error::InvalidTransition(InProgress, NotStarted))
        );
        assert_eq!(
            check_user_action_transition(InProgress, InProgress),
            Err(Error::InvalidTransition(InProgress, InProgress))
        );
    }

    #[test]
    fn test_claim() {
        assert!(check_reward_claim(false).is_ok());
        assert_eq!(check_reward_claim(true), Err(Error::AlreadyClaimed));
    }
}
