//! epp-client: EPP session client
//!
//! [`EppSession`] is the state machine for one conversation with a
//! registry server; [`CommandSequencer`] drives a session through login,
//! a list of operations, and logout.

pub mod sequencer;
pub mod session;

pub use sequencer::{CommandSequencer, Operation, SequenceReport, StepOutcome};
pub use session::{EppSession, SessionError, DEFAULT_GREETING_TIMEOUT};
