//! Transfer status state machine.

use super::error::TransitionError;
use super::types::TransferStatus;

/// An accepted transfer status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTransition {
    /// Status before the change.
    pub from: TransferStatus,
    /// Status after the change.
    pub to: TransferStatus,
    /// True when the change moves stock between the two sites.
    pub applies_balance: bool,
}

impl TransferStatus {
    /// Validates a status change.
    ///
    /// # Arguments
    /// * `next` - The requested status
    ///
    /// # Returns
    /// * `Ok(TransferTransition)` for forward moves and cancellations of open transfers
    /// * `Err(TransitionError::Transfer)` for backward moves, same-status requests, and
    ///   anything leaving `Completed` or `Cancelled`
    pub fn transition_to(
        self,
        next: TransferStatus,
    ) -> Result<TransferTransition, TransitionError> {
        use TransferStatus::{Cancelled, Completed, InTransit, Pending};

        match (self, next) {
            (Pending, InTransit) | (Pending | InTransit, Completed | Cancelled) => {
                Ok(TransferTransition {
                    from: self,
                    to: next,
                    applies_balance: next == Completed,
                })
            }
            _ => Err(TransitionError::Transfer {
                from: self,
                to: next,
            }),
        }
    }

    /// Returns true if a transfer may be created with this status.
    #[must_use]
    pub fn is_valid_initial(&self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use TransferStatus::{Cancelled, Completed, InTransit, Pending};

    #[rstest]
    #[case(Pending, InTransit, false)]
    #[case(Pending, Completed, true)]
    #[case(Pending, Cancelled, false)]
    #[case(InTransit, Completed, true)]
    #[case(InTransit, Cancelled, false)]
    fn test_allowed_transitions(
        #[case] from: TransferStatus,
        #[case] to: TransferStatus,
        #[case] applies_balance: bool,
    ) {
        let transition = from.transition_to(to).unwrap();
        assert_eq!(transition.from, from);
        assert_eq!(transition.to, to);
        assert_eq!(transition.applies_balance, applies_balance);
    }

    #[rstest]
    #[case(Pending, Pending)]
    #[case(InTransit, Pending)]
    #[case(InTransit, InTransit)]
    #[case(Completed, Pending)]
    #[case(Completed, InTransit)]
    #[case(Completed, Completed)]
    #[case(Completed, Cancelled)]
    #[case(Cancelled, Pending)]
    #[case(Cancelled, InTransit)]
    #[case(Cancelled, Completed)]
    #[case(Cancelled, Cancelled)]
    fn test_rejected_transitions(#[case] from: TransferStatus, #[case] to: TransferStatus) {
        assert_eq!(
            from.transition_to(to),
            Err(TransitionError::Transfer { from, to })
        );
    }

    #[test]
    fn test_initial_statuses() {
        assert!(Pending.is_valid_initial());
        assert!(InTransit.is_valid_initial());
        assert!(!Completed.is_valid_initial());
        assert!(!Cancelled.is_valid_initial());
    }
}
