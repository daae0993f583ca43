use cucumber::World;
use recon_engine::{order_objects::TransitionOutcome, ReconciliationError};

use crate::support::ReconSystem;

#[derive(Default, Debug, World)]
pub struct ReconWorld {
    pub system: Option<ReconSystem>,
    pub last_result: Option<Result<TransitionOutcome, ReconciliationError>>,
    pub last_document: Option<Result<Vec<u8>, ReconciliationError>>,
}

impl ReconWorld {
    pub fn system(&self) -> &ReconSystem {
        self.system.as_ref().expect("Reconciliation system not initialised")
    }

    pub fn last_error(&self) -> &ReconciliationError {
        match self.last_result.as_ref().expect("No event has been applied") {
            Err(e) => e,
            Ok(outcome) => panic!("Expected an error, but the event was applied: {outcome:?}"),
        }
    }
}
