//! The entry execution engine: the create/adjust state machine posting
//! resolved entries under the locking protocol.

pub mod adjustment;
pub mod ledger;

pub use adjustment::{accumulate_lines, accumulate_movements, diff_postings, Posting};
pub use ledger::{Execution, Ledger, Outcome, PostedEntry};
