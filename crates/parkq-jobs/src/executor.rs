//! Lookup executor abstraction.

use crate::error::LookupError;
use crate::key::JobKey;
use async_trait::async_trait;
use serde_json::Value;

/// Performs the actual lookup for a leased job.
///
/// Implementations drive whatever does the work (a browser session, an HTTP
/// client, a fixture). The worker bounds every call with its lookup timeout
/// and drops the future if the lease is lost, so implementations must be
/// cancel-safe.
#[async_trait]
pub trait LookupExecutor: Send + Sync {
    /// Look up the ticket/plate pair and return the result payload.
    async fn perform(&self, key: &JobKey) -> Result<Value, LookupError>;
}
