//! Detect command implementation

use std::path::Path;

use anyhow::{Context, Result};
use recur_core::{DetectionStats, PatternAmount, RecurConfig, RecurringPattern};

use super::{detection_config, load_transactions, run_detection, truncate};

pub fn cmd_detect(
    config: &RecurConfig,
    file: &Path,
    format: Option<&str>,
    min_occurrences: Option<usize>,
    json: bool,
    use_ai: bool,
) -> Result<()> {
    let detection = detection_config(config, min_occurrences)?;
    let transactions = load_transactions(file, format)?;
    let (patterns, stats) = run_detection(config, &detection, &transactions, use_ai)?;

    if json {
        let output = serde_json::json!({
            "patterns": patterns,
            "stats": stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("Failed to serialize patterns")?
        );
        return Ok(());
    }

    print_patterns(&patterns);
    print_stats(&stats);
    Ok(())
}

fn print_patterns(patterns: &[RecurringPattern]) {
    println!();
    if patterns.is_empty() {
        println!("🔍 No recurring patterns found.");
        return;
    }

    println!("🔍 Detected {} recurring patterns", patterns.len());
    println!("   ─────────────────────────────────────────────────────────────────────────────");
    for pattern in patterns {
        println!("   {}", pattern_row(pattern));
    }
    println!();
    println!("   Why:");
    for pattern in patterns {
        println!(
            "   • {}: {}",
            truncate(&pattern.normalized_merchant, 24),
            pattern.reasoning
        );
    }
}

/// One table row: direction, merchant, type, cadence, amount, confidence, next date
pub fn pattern_row(pattern: &RecurringPattern) -> String {
    let icon = if pattern.is_expense() { "💸" } else { "💰" };
    format!(
        "{} {:24} │ {:9} │ {:9} │ {:>17} │ {:>4.0}% │ next {}",
        icon,
        truncate(&pattern.normalized_merchant, 24),
        pattern.pattern_type.as_str(),
        pattern.cadence.as_str(),
        format_charge(&pattern.charge),
        pattern.confidence * 100.0,
        pattern.next_expected_date
    )
}

/// "$15.99" for fixed amounts, "$45.90-$68.12" for ranges
pub fn format_charge(charge: &PatternAmount) -> String {
    match charge {
        PatternAmount::Fixed { amount } => format!("${:.2}", amount),
        PatternAmount::Range { amount_range } => {
            format!("${:.2}-${:.2}", amount_range.min, amount_range.max)
        }
    }
}

fn print_stats(stats: &DetectionStats) {
    println!();
    println!("📊 Detection stats");
    println!("   Transactions:        {}", stats.total_transactions);
    if stats.ignored_zero_amount > 0 {
        println!("   Ignored (zero):      {}", stats.ignored_zero_amount);
    }
    println!("   Merchant groups:     {}", stats.total_groups_considered);
    println!("   Patterns:            {}", stats.patterns_detected);
    println!(
        "   Rejected:            {} (generic {}, too few {}, irregular dates {}, irregular amounts {})",
        stats.total_rejected(),
        stats.rejected_generic,
        stats.rejected_insufficient_occurrences,
        stats.rejected_irregular_dates,
        stats.rejected_irregular_amount
    );
    if stats.resolver_calls + stats.confirmer_calls > 0 {
        println!(
            "   AI:                  {} name lookups ({} accepted), {} confirmations ({} confirmed)",
            stats.resolver_calls,
            stats.resolver_accepted,
            stats.confirmer_calls,
            stats.confirmer_confirmed
        );
    }
    if stats.collaborator_failures > 0 {
        println!(
            "   ⚠️  {} AI calls failed; affected patterns use rule-based fallbacks",
            stats.collaborator_failures
        );
    }
}
