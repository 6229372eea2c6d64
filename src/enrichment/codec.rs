use crate::error::{AppError, Result};
use crate::models::Alert;

/// Decode a JSON array of alerts.
///
/// Any malformed alert fails the whole batch.
pub fn decode_batch(body: &[u8]) -> Result<Vec<Alert>> {
    serde_json::from_slice(body).map_err(|e| AppError::Decode(e.to_string()))
}

/// Encode alerts back into a JSON array
pub fn encode_batch(alerts: &[Alert]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(alerts)?)
}
