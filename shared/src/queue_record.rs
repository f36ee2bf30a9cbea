//! The result shape every mutating queue operation returns.

use crate::request::Request;
use serde::{Deserialize, Serialize};

/// Returned by `add`/`update` on a queue-like source; drives the caller's
/// local unique-key cache and tells it whether the backend did any new
/// work at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueOperationInfo {
    pub request_id: String,
    pub was_already_present: bool,
    pub was_already_handled: bool,
    pub request: Request,
}
