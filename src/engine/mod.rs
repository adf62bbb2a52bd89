//! The sync engine: conflict detection, the conflict ledger, and
//! role-based view projection.

pub mod detector;
pub mod projection;

pub use detector::{BatchOutcome, Detector, ResolveConflicts, ResolveError};
pub use projection::{batch_view, member_view, registration_view};
