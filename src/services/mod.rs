pub mod charge_service;
pub mod clock;
pub mod ledger;
pub mod payment_service;

pub use charge_service::{ChargeService, CreateChargeRequest};
pub use clock::{Clock, FixedClock, SystemClock};
pub use ledger::{BalanceLedger, LedgerError};
pub use payment_service::{PaymentRequest, PaymentService};

/// Upper bound on optimistic-commit retries before a `Conflict` is
/// surfaced to the caller.
pub(crate) const MAX_COMMIT_RETRIES: usize = 3;
