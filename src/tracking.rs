//! Rename tracking.
//!
//! Follows edits made to occurrences of one identifier and turns them into a
//! structural rename once the user asks for it.

pub mod controller;
pub mod registry;
pub mod span;
pub mod tracker;

pub use controller::{RenameController, RenameStatus};
pub use registry::{SessionId, SessionRegistry};
pub use span::TrackedSpan;
pub use tracker::{AbortReason, AcceptOutcome, TextChangeTracker, is_identifier_text};
