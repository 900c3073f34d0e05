//! Transaction state machine

use crate::{Error, Result};

/// Transaction state of a connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction in progress
    #[default]
    Idle,

    /// Between a successful begin and the matching commit/rollback
    InTransaction,
}

impl TransactionState {
    /// Check if transition is valid
    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        use TransactionState::*;

        matches!((self, next), (Idle, InTransaction) | (InTransaction, Idle))
    }

    /// Validate a transition without performing it
    pub fn check(&self, next: TransactionState) -> Result<()> {
        if self.can_transition_to(next) {
            return Ok(());
        }
        let reason = match self {
            Self::InTransaction => "nested transactions not supported",
            Self::Idle => "no transaction in progress",
        };
        Err(Error::Transaction(reason.into()))
    }

    /// Transition to new state
    pub fn transition(&mut self, next: TransactionState) -> Result<()> {
        self.check(next)?;
        *self = next;
        Ok(())
    }

    /// Drop back to idle unconditionally (session ended)
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InTransaction => write!(f, "in_transaction"),
        }
    }
}
