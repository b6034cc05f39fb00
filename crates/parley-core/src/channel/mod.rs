//! Channel subscriptions.

pub mod membership;

pub use membership::{ChannelMembership, ReloadDiff};
