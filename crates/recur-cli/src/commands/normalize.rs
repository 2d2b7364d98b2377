//! Normalize command implementation

use anyhow::Result;
use recur_core::normalize::NormalizedMerchant;
use recur_core::{MerchantNormalizer, RecurConfig};

pub fn cmd_normalize(config: &RecurConfig, names: &[String]) -> Result<()> {
    let normalizer = MerchantNormalizer::with_aliases(&config.aliases);

    println!();
    for raw in names {
        println!("   {}", normalize_row(raw, &normalizer.normalize(raw)));
    }
    Ok(())
}

/// `raw → canonical` plus alias/generic markers
pub fn normalize_row(raw: &str, normalized: &NormalizedMerchant) -> String {
    let mut row = format!("{} → {}", raw, normalized.canonical);
    if normalized.alias_hit {
        row.push_str("  (alias)");
    }
    if normalized.generic {
        row.push_str("  (generic, never recurring)");
    }
    row
}
