//! Message routing and history.

pub mod history;
pub mod router;

pub use history::HistoryService;
pub use router::{MessageRouter, RouteReport};
