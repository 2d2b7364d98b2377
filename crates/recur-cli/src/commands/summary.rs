//! Summary command implementation

use std::path::Path;

use anyhow::{Context, Result};
use recur_core::{RecurConfig, RecurringItem, RecurringSummary, SummaryAggregator};

use super::{load_transactions, run_detection, truncate};

pub fn cmd_summary(
    config: &RecurConfig,
    file: &Path,
    format: Option<&str>,
    user: &str,
    json: bool,
    use_ai: bool,
) -> Result<()> {
    let transactions = load_transactions(file, format)?;
    let (patterns, _stats) = run_detection(config, &config.detection, &transactions, use_ai)?;

    let summary = SummaryAggregator::new(config.summary.clone()).summarize(
        user,
        &patterns,
        Some(&config.categories),
    );

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RecurringSummary) {
    println!();
    println!("📋 Recurring Summary for {}", summary.user_id);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Monthly cost:   ${:.2}", summary.total_monthly_cost);
    println!("   Monthly income: ${:.2}", summary.total_monthly_income);

    if summary.subscriptions.is_empty() && summary.recurring_income.is_empty() {
        println!();
        println!("   No recurring charges or income found.");
        return;
    }

    if !summary.subscriptions.is_empty() {
        println!();
        println!("   Subscriptions");
        for item in &summary.subscriptions {
            println!("   {}", item_row(item));
        }
    }

    if !summary.recurring_income.is_empty() {
        println!();
        println!("   Income");
        for item in &summary.recurring_income {
            println!("   {}", item_row(item));
        }
    }

    if !summary.by_category.is_empty() {
        println!();
        println!("   By category");
        for (category, total) in &summary.by_category {
            println!("   {:16} ${:>9.2}/mo", category, total);
        }
    }

    if !summary.cancellation_opportunities.is_empty() {
        let savings: f64 = summary
            .cancellation_opportunities
            .iter()
            .map(|o| o.monthly_savings)
            .sum();
        println!();
        println!("💡 Cancellation ideas (up to ${:.2}/mo)", savings);
        for opportunity in &summary.cancellation_opportunities {
            println!(
                "   • {:24} ${:>8.2}/mo  {}",
                truncate(&opportunity.merchant_name, 24),
                opportunity.monthly_savings,
                opportunity.reason
            );
        }
    }
}

/// One summary line: merchant, category, amount per cadence, monthly cost, next date
pub fn item_row(item: &RecurringItem) -> String {
    format!(
        "{:24} │ {:13} │ {:>9} {:9} │ ${:>8.2}/mo │ next {}",
        truncate(&item.merchant_name, 24),
        item.category,
        format!("${:.2}", item.amount),
        item.cadence.as_str(),
        item.monthly_cost,
        item.next_charge_date
    )
}
