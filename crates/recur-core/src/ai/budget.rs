//! Spend ceiling for model calls
//!
//! Every call is charged a fixed estimated cost. Daily and monthly totals
//! reset when the calendar day or month rolls over.

use std::sync::Mutex;

use chrono::{Datelike, Local, NaiveDate};
use tracing::warn;

use crate::config::AiSettings;
use crate::error::{Error, Result};

#[derive(Debug)]
struct Ledger {
    day: NaiveDate,
    spent_today: f64,
    spent_this_month: f64,
}

/// Daily and monthly spend caps shared by all calls through one adapter
#[derive(Debug)]
pub struct CostBudget {
    cost_per_call: f64,
    daily_limit: f64,
    monthly_limit: f64,
    ledger: Mutex<Ledger>,
}

impl CostBudget {
    pub fn new(cost_per_call: f64, daily_limit: f64, monthly_limit: f64) -> Self {
        Self {
            cost_per_call,
            daily_limit,
            monthly_limit,
            ledger: Mutex::new(Ledger {
                day: Local::now().date_naive(),
                spent_today: 0.0,
                spent_this_month: 0.0,
            }),
        }
    }

    pub fn from_settings(settings: &AiSettings) -> Self {
        Self::new(
            settings.cost_per_call,
            settings.daily_budget,
            settings.monthly_budget,
        )
    }

    /// Charge one call against today's date
    pub fn check_and_charge(&self) -> Result<()> {
        self.check_and_charge_on(Local::now().date_naive())
    }

    /// Charge one call as of `today`.
    ///
    /// A zero limit disables calls entirely. Nothing is charged when the call
    /// is refused.
    pub fn check_and_charge_on(&self, today: NaiveDate) -> Result<()> {
        if self.daily_limit <= 0.0 || self.monthly_limit <= 0.0 {
            return Err(Error::BudgetExceeded("AI calls disabled by budget".into()));
        }

        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| Error::Collaborator("budget ledger poisoned".into()))?;

        if (ledger.day.year(), ledger.day.month()) != (today.year(), today.month()) {
            ledger.spent_this_month = 0.0;
            ledger.spent_today = 0.0;
        } else if ledger.day != today {
            ledger.spent_today = 0.0;
        }
        ledger.day = today;

        if ledger.spent_today + self.cost_per_call > self.daily_limit {
            warn!(spent = ledger.spent_today, limit = self.daily_limit, "Daily AI budget reached");
            return Err(Error::BudgetExceeded(format!(
                "daily limit ${:.2} reached",
                self.daily_limit
            )));
        }
        if ledger.spent_this_month + self.cost_per_call > self.monthly_limit {
            warn!(
                spent = ledger.spent_this_month,
                limit = self.monthly_limit,
                "Monthly AI budget reached"
            );
            return Err(Error::BudgetExceeded(format!(
                "monthly limit ${:.2} reached",
                self.monthly_limit
            )));
        }

        ledger.spent_today += self.cost_per_call;
        ledger.spent_this_month += self.cost_per_call;
        Ok(())
    }

    /// Spend recorded so far as (today, this month)
    pub fn spent(&self) -> (f64, f64) {
        match self.ledger.lock() {
            Ok(ledger) => (ledger.spent_today, ledger.spent_this_month),
            Err(_) => (0.0, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_limit_refuses_without_charging() {
        let budget = CostBudget::new(0.5, 1.0, 10.0);
        let today = day(2024, 3, 10);
        assert!(budget.check_and_charge_on(today).is_ok());
        assert!(budget.check_and_charge_on(today).is_ok());

        let err = budget.check_and_charge_on(today).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
        assert_eq!(budget.spent(), (1.0, 1.0));
    }

    #[test]
    fn test_new_day_resets_daily_total() {
        let budget = CostBudget::new(0.5, 1.0, 10.0);
        budget.check_and_charge_on(day(2024, 3, 10)).unwrap();
        budget.check_and_charge_on(day(2024, 3, 10)).unwrap();
        assert!(budget.check_and_charge_on(day(2024, 3, 11)).is_ok());
        assert_eq!(budget.spent(), (0.5, 1.5));
    }

    #[test]
    fn test_monthly_limit_and_rollover() {
        let budget = CostBudget::new(1.0, 5.0, 2.0);
        budget.check_and_charge_on(day(2024, 3, 1)).unwrap();
        budget.check_and_charge_on(day(2024, 3, 2)).unwrap();
        assert!(budget.check_and_charge_on(day(2024, 3, 3)).is_err());

        assert!(budget.check_and_charge_on(day(2024, 4, 1)).is_ok());
        assert_eq!(budget.spent(), (1.0, 1.0));
    }

    #[test]
    fn test_zero_budget_disables_calls() {
        let budget = CostBudget::new(0.0, 0.0, 20.0);
        assert!(budget.check_and_charge_on(day(2024, 3, 1)).is_err());
    }
}
