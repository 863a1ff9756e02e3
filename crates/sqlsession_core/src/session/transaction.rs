use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Lifecycle state of one transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// Handle to the transaction bound to a unit of work.
///
/// Clones share state, so a handle observed before commit reports the final
/// outcome afterwards.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    id: Uuid,
    state: Arc<Mutex<TransactionState>>,
}

impl TransactionHandle {
    pub(crate) fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(TransactionState::Active)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    pub fn was_committed(&self) -> bool {
        self.state() == TransactionState::Committed
    }

    pub fn was_rolled_back(&self) -> bool {
        self.state() == TransactionState::RolledBack
    }

    pub(crate) fn finish(&self, outcome: TransactionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
    }
}
