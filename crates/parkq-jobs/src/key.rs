//! Job keys and worker identifiers.

use crate::error::{LeaseError, LeaseResult};
use serde::Serialize;
use std::fmt;

/// Composite key of a lookup job.
///
/// Both parts are trimmed and upper-cased, so `" pm1 "` and `"PM1"` name the
/// same job. Displayed as `TICKET|PLATE`; neither part may contain `|`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobKey {
    ticket_num: String,
    plate_num: String,
}

impl JobKey {
    /// Separator used by the display form.
    pub const SEPARATOR: char = '|';

    /// Normalizes and validates a ticket/plate pair.
    pub fn new(ticket_num: &str, plate_num: &str) -> LeaseResult<Self> {
        let ticket_num = normalize("ticketNum", ticket_num)?;
        let plate_num = normalize("plateNum", plate_num)?;
        Ok(Self {
            ticket_num,
            plate_num,
        })
    }

    /// Returns the normalized ticket identifier.
    pub fn ticket_num(&self) -> &str {
        &self.ticket_num
    }

    /// Returns the normalized plate identifier.
    pub fn plate_num(&self) -> &str {
        &self.plate_num
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.ticket_num, Self::SEPARATOR, self.plate_num)
    }
}

fn normalize(field: &str, value: &str) -> LeaseResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(LeaseError::Validation(format!("{} is required", field)));
    }
    if value.contains(JobKey::SEPARATOR) {
        return Err(LeaseError::Validation(format!(
            "{} must not contain '{}'",
            field,
            JobKey::SEPARATOR
        )));
    }
    Ok(value.to_uppercase())
}

/// Caller-supplied worker identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Validates a client id. Surrounding whitespace is dropped; case is kept.
    pub fn parse(client_id: &str) -> LeaseResult<Self> {
        let client_id = client_id.trim();
        if client_id.is_empty() {
            return Err(LeaseError::Validation("clientId is required".to_string()));
        }
        Ok(Self(client_id.to_string()))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
