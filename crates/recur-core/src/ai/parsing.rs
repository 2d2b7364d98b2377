//! JSON parsing helpers for AI backend responses
//!
//! These functions extract JSON from AI model responses, which often include
//! extra text before/after the JSON payload.

use serde::de::DeserializeOwned;

use crate::collaborators::{AmountConfirmation, MerchantResolution};
use crate::error::{Error, Result};

use super::types::{MerchantAnswer, RecurringAnswer};

/// Parse a merchant resolution from an AI response
pub fn parse_merchant_resolution(response: &str) -> Result<MerchantResolution> {
    let answer: MerchantAnswer = extract_json(response, "merchant resolution")?;
    if answer.merchant.trim().is_empty() {
        return Err(Error::InvalidData(
            "Empty merchant name in AI response".into(),
        ));
    }
    check_confidence(answer.confidence)?;
    Ok(answer.into())
}

/// Parse a variable-amount confirmation from an AI response
pub fn parse_amount_confirmation(response: &str) -> Result<AmountConfirmation> {
    let answer: RecurringAnswer = extract_json(response, "recurring confirmation")?;
    check_confidence(answer.confidence)?;
    Ok(answer.into())
}

/// Deserialize the outermost `{...}` object in `response`
fn extract_json<T: DeserializeOwned>(response: &str, what: &str) -> Result<T> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &response[s..=e];
            serde_json::from_str(json_str).map_err(|e| {
                Error::InvalidData(format!(
                    "Invalid {} JSON from AI: {} | Raw: {}",
                    what,
                    e,
                    truncate(json_str)
                ))
            })
        }
        _ => Err(Error::InvalidData(format!(
            "No JSON found in AI {} response | Raw: {}",
            what,
            truncate(response)
        ))),
    }
}

fn check_confidence(confidence: f64) -> Result<()> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(Error::InvalidData(format!(
            "AI confidence out of range: {}",
            confidence
        )))
    }
}

/// Truncate long responses for error messages
fn truncate(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}
