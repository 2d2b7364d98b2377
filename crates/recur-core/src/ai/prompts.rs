//! Prompt text for the collaborator calls
//!
//! Each prompt asks for a single JSON object so responses can go through
//! [`super::parsing`].

/// Marker the mock server uses to recognize merchant prompts
pub const MERCHANT_MARKER: &str = "Identify the merchant behind this bank description:";

/// Marker the mock server uses to recognize recurrence prompts
pub const RECURRING_MARKER: &str = "Decide whether these charges are one recurring bill:";

pub fn merchant_prompt(raw_name: &str) -> String {
    format!(
        r#"{marker} "{raw}"

Answer with JSON only:
{{"merchant": "<canonical merchant name>", "merchant_type": "<merchant|atm|transfer|payment|cash>", "confidence": <0.0-1.0>, "reason": "<short reason>"}}

Use merchant_type "atm", "transfer", "payment" or "cash" when the description is
banking activity rather than a business."#,
        marker = MERCHANT_MARKER,
        raw = raw_name.replace('"', "'"),
    )
}

pub fn recurring_prompt(merchant: &str, amounts: &[f64], observed_date_pattern: &str) -> String {
    let amounts = amounts
        .iter()
        .map(|a| format!("{:.2}", a))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"{marker}
Merchant: "{merchant}"
Amounts (oldest first): [{amounts}]
Observed dates: {pattern}

Usage-based bills (utilities, metered services) vary in amount but still recur.
Answer with JSON only:
{{"is_recurring": <true|false>, "cadence": "<weekly|biweekly|monthly|quarterly|annual>", "expected_range": [<min>, <max>], "confidence": <0.0-1.0>, "reason": "<one sentence>"}}"#,
        marker = RECURRING_MARKER,
        merchant = merchant.replace('"', "'"),
        amounts = amounts,
        pattern = observed_date_pattern,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merchant_prompt_quotes_description() {
        let prompt = merchant_prompt(r#"SQ *"BLUE" BOTTLE"#);
        assert!(prompt.starts_with(MERCHANT_MARKER));
        assert!(prompt.contains(r#""SQ *'BLUE' BOTTLE""#));
    }

    #[test]
    fn test_recurring_prompt_lists_amounts() {
        let prompt = recurring_prompt("city water", &[10.0, 40.5], "monthly, gaps 29-31 days");
        assert!(prompt.starts_with(RECURRING_MARKER));
        assert!(prompt.contains("[10.00, 40.50]"));
        assert!(prompt.contains("monthly, gaps 29-31 days"));
    }
}
