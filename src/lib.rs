pub mod db;
pub mod debts;
pub mod error;
pub mod goals;
pub mod insight;
pub mod ledger;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

pub use crate::db::{default_db_path, init_db, open_connection};
pub use crate::debts::{
    add_debt, compute_outstanding_debt, delete_debt, list_debts, record_debt_payment, Debt,
    DebtDirection,
};
pub use crate::error::{Error, Result};
pub use crate::goals::{
    add_savings_goal, compute_savings_total, contribute_to_goal, delete_savings_goal,
    list_savings_goals, list_unfunded_goal_names, SavingsGoal,
};
pub use crate::insight::{
    build_advice, build_alerts, compute_dashboard_summary, compute_financial_report,
    executive_summary, fmt_money, health_score, month_comparison, next_month_goal, rank_categories,
    CategoryInsight, DashboardSummary, FinancialReport, HealthScore, Tier,
};
pub use crate::ledger::{
    add_expense, add_income, compute_category_breakdown, compute_filtered_totals,
    compute_monthly_totals, delete_transaction, list_transactions, CategoryTotal, EntryKind,
    MonthlyAggregate, Transaction,
};

/// A (year, month) partition of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidInput(format!("month out of range: {}", month)));
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    /// The preceding calendar month; January wraps to December of the prior year.
    pub fn prev(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub(crate) fn year_str(&self) -> String {
        format!("{:04}", self.year)
    }

    pub(crate) fn month_str(&self) -> String {
        format!("{:02}", self.month)
    }
}

/// Immutable view context for history listings and the dashboard card:
/// a month plus an optional day-of-month restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerFilter {
    pub period: Period,
    pub day: Option<u32>,
}

impl LedgerFilter {
    pub fn month(period: Period) -> Self {
        Self { period, day: None }
    }

    pub fn day(period: Period, day: u32) -> Self {
        Self {
            period,
            day: Some(day),
        }
    }
}

pub(crate) fn resolve_date_local(date_local: Option<String>) -> Result<String> {
    match date_local {
        Some(value) => {
            NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map_err(|err| Error::InvalidInput(format!("invalid date_local: {}", err)))?;
            Ok(value)
        }
        None => Ok(Local::now().format("%Y-%m-%d").to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_prev_within_year() {
        let period = Period::new(2025, 5).expect("period");
        assert_eq!(period.prev(), Period { year: 2025, month: 4 });
    }

    #[test]
    fn period_prev_wraps_january() {
        let period = Period::new(2025, 1).expect("period");
        assert_eq!(period.prev(), Period { year: 2024, month: 12 });
    }

    #[test]
    fn period_rejects_bad_month() {
        assert!(Period::new(2025, 0).is_err());
        assert!(Period::new(2025, 13).is_err());
    }

    #[test]
    fn period_strings_are_zero_padded() {
        let period = Period::new(2025, 5).expect("period");
        assert_eq!(period.year_str(), "2025");
        assert_eq!(period.month_str(), "05");
    }

    #[test]
    fn resolve_date_accepts_valid_and_rejects_malformed() {
        assert_eq!(
            resolve_date_local(Some("2025-05-10".to_string())).expect("date"),
            "2025-05-10"
        );
        assert!(resolve_date_local(Some("10/05/2025".to_string())).is_err());
        assert!(resolve_date_local(Some("2025-13-40".to_string())).is_err());
    }

    #[test]
    fn resolve_date_defaults_to_today() {
        let today = Local::now().format("%Y-%m-%d").to_string();
        assert_eq!(resolve_date_local(None).expect("date"), today);
    }
}
