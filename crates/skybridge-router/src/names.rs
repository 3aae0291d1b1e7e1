//! Endpoint name rules.

use crate::error::{Result, RouterError};

/// Name reserved for the ground control station.
pub const CONTROL_STATION: &str = "GCS";

/// Any endpoint name: non-empty, no whitespace.
///
/// Names travel inside space-delimited notices, so whitespace would split them.
pub fn validate_endpoint_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RouterError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if name.chars().any(char::is_whitespace) {
        return Err(RouterError::InvalidName {
            name: name.to_string(),
            reason: "name contains whitespace",
        });
    }
    Ok(())
}

/// A participant (vehicle) name: endpoint rules plus not the control station.
pub fn validate_participant_name(name: &str) -> Result<()> {
    validate_endpoint_name(name)?;
    if name == CONTROL_STATION {
        return Err(RouterError::InvalidName {
            name: name.to_string(),
            reason: "name is reserved for the control station",
        });
    }
    Ok(())
}
