mod pending;
mod processed;

pub use pending::{PendingRequest, PendingRequests};
pub use processed::ProcessedMessageSet;
