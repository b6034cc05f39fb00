//! Live session tracking.

pub mod registry;

pub use registry::{RegisterOutcome, SessionRegistry};
