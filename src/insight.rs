use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::debts::compute_outstanding_debt;
use crate::error::Result;
use crate::goals::{compute_savings_total, list_unfunded_goal_names};
use crate::ledger::{
    compute_category_breakdown, compute_filtered_totals, compute_monthly_totals, CategoryTotal,
    MonthlyAggregate,
};
use crate::{LedgerFilter, Period};

/// Qualitative band for the 0-100 health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    #[serde(rename = "EXCELLENT")]
    Excellent,
    #[serde(rename = "VERY GOOD")]
    VeryGood,
    #[serde(rename = "GOOD")]
    Good,
    #[serde(rename = "NEEDS IMPROVEMENT")]
    NeedsImprovement,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl Tier {
    // Thresholds are closed on the lower bound: exactly 85 is EXCELLENT.
    fn for_score(score: f64) -> Self {
        if score >= 85.0 {
            Tier::Excellent
        } else if score >= 70.0 {
            Tier::VeryGood
        } else if score >= 50.0 {
            Tier::Good
        } else if score >= 30.0 {
            Tier::NeedsImprovement
        } else {
            Tier::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Excellent => "EXCELLENT",
            Tier::VeryGood => "VERY GOOD",
            Tier::Good => "GOOD",
            Tier::NeedsImprovement => "NEEDS IMPROVEMENT",
            Tier::Critical => "CRITICAL",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Tier::Excellent => "🏆",
            Tier::VeryGood => "💪",
            Tier::Good => "✅",
            Tier::NeedsImprovement => "⚠️",
            Tier::Critical => "🚨",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Tier::Excellent => "#10b981",
            Tier::VeryGood => "#3b82f6",
            Tier::Good => "#f59e0b",
            Tier::NeedsImprovement => "#f97316",
            Tier::Critical => "#ef4444",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthScore {
    pub score: f64,
    pub tier: Tier,
    pub icon: &'static str,
    pub color: &'static str,
}

/// Weighted-threshold health score on a 0-10 display scale.
///
/// All three weighted factors require income > 0; with no income the base
/// value of 50 stands untouched, whatever the other figures say.
pub fn health_score(income: f64, expense: f64, savings: f64, debt: f64) -> HealthScore {
    let mut score = 50.0_f64;
    if income > 0.0 {
        let savings_rate = (income - expense) / income;
        score += if savings_rate >= 0.30 {
            30.0
        } else if savings_rate >= 0.20 {
            25.0
        } else if savings_rate >= 0.10 {
            20.0
        } else if savings_rate >= 0.0 {
            15.0
        } else {
            (15.0 + savings_rate * 50.0).max(0.0)
        };

        let debt_ratio = debt / income;
        score += if debt_ratio <= 0.10 {
            20.0
        } else if debt_ratio <= 0.30 {
            15.0
        } else if debt_ratio <= 0.50 {
            10.0
        } else {
            (10.0 - debt_ratio * 10.0).max(0.0)
        };

        // Progress toward a buffer of three months of income.
        let buffer_progress = savings / (income * 3.0);
        score += (buffer_progress * 100.0).min(20.0);
    }

    let score = score.clamp(0.0, 100.0);
    let tier = Tier::for_score(score);
    HealthScore {
        score: round1(score / 10.0),
        tier,
        icon: tier.icon(),
        color: tier.color(),
    }
}

/// `$N,NNN` with thousands separators and no decimals. Total: non-finite
/// input renders as `$0` rather than failing.
pub fn fmt_money(value: f64) -> String {
    if !value.is_finite() {
        return "$0".to_string();
    }
    let units = value.abs().round() as i64;
    let digits = units.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 && units > 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn fmt_signed_pct(value: f64) -> String {
    format!("{:+.0}%", value)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn pct_change(current: f64, prior: f64) -> f64 {
    if prior > 0.0 {
        (current - prior) / prior * 100.0
    } else {
        0.0
    }
}

fn shift_word(delta_pct: f64) -> &'static str {
    if delta_pct > 20.0 {
        "rose sharply"
    } else if delta_pct > 5.0 {
        "rose"
    } else if delta_pct >= -5.0 {
        "stayed stable"
    } else if delta_pct >= -20.0 {
        "fell"
    } else {
        "fell drastically"
    }
}

pub fn executive_summary(income: f64, expense: f64) -> String {
    if income == 0.0 && expense == 0.0 {
        return "No movements recorded yet. Start by adding your income and expenses.".to_string();
    }
    if expense > income {
        return format!(
            "⚠️ Your expenses ({}) exceed your income ({}) by {}.",
            fmt_money(expense),
            fmt_money(income),
            fmt_money(expense - income)
        );
    }
    // Here income > 0: the zero-income cases both land in the branches above.
    let savings_rate = (income - expense) / income * 100.0;
    format!(
        "🌟 Positive balance of {}. You are keeping {:.1}% of your income ({} earned, {} spent).",
        fmt_money(income - expense),
        savings_rate,
        fmt_money(income),
        fmt_money(expense)
    )
}

pub fn month_comparison(current: &MonthlyAggregate, prior: &MonthlyAggregate) -> String {
    if prior.income == 0.0 && prior.expense == 0.0 {
        if current.income > 0.0 || current.expense > 0.0 {
            return format!(
                "🎉 100% improvement over last month. This month: {} income, {} expenses.",
                fmt_money(current.income),
                fmt_money(current.expense)
            );
        }
        return "No data for the previous month.".to_string();
    }

    let income_delta = pct_change(current.income, prior.income);
    let expense_delta = pct_change(current.expense, prior.expense);
    let balance_now = current.balance();
    let balance_prior = prior.balance();
    let trend = if balance_now > balance_prior { "📈" } else { "📉" };

    let balance_part = if balance_prior == 0.0 {
        format!(
            "balance {} vs {} (no prior data)",
            fmt_money(balance_now),
            fmt_money(balance_prior)
        )
    } else {
        let balance_delta = (balance_now - balance_prior) / balance_prior.abs() * 100.0;
        format!(
            "balance {} vs {} ({})",
            fmt_money(balance_now),
            fmt_money(balance_prior),
            fmt_signed_pct(balance_delta)
        )
    };

    format!(
        "{} Income {} ({}), expenses {} ({}), {}.",
        trend,
        shift_word(income_delta),
        fmt_signed_pct(income_delta),
        shift_word(expense_delta),
        fmt_signed_pct(expense_delta),
        balance_part
    )
}

/// Up to three warnings, highest priority first.
pub fn build_alerts(
    income: f64,
    expense: f64,
    savings: f64,
    debt: f64,
    unfunded_goals: &[String],
) -> Vec<String> {
    let mut alerts = Vec::new();
    if savings == 0.0 && income > 0.0 {
        alerts.push("You are not saving anything right now.".to_string());
    }
    if expense > income && income > 0.0 {
        alerts.push(format!(
            "You spend {} more than you earn.",
            fmt_money(expense - income)
        ));
    }
    if income > 0.0 && debt > income * 0.4 {
        alerts.push(format!(
            "Your debts ({}) exceed 40% of your income.",
            fmt_money(debt)
        ));
    }
    if let Some(name) = unfunded_goals.first() {
        alerts.push(format!("Your savings goal \"{}\" has no funds yet.", name));
    }
    alerts.truncate(3);
    alerts
}

// Exact-match insight per category, generic fallback below.
const CATEGORY_INSIGHTS: &[(&str, &str)] = &[
    ("FOOD", "Essential spending. Optimize it with planned, smart shopping."),
    ("TRANSPORT", "Compare cheaper routes or shared rides before you pay."),
    ("ENTERTAINMENT", "Set a fixed fun budget before the month starts."),
    ("SERVICES", "Audit your subscriptions and cancel what you no longer use."),
    ("CLOTHING", "Buy out of season and skip impulse purchases."),
    ("HEALTH", "Essential spending. Preventive care costs less than emergencies."),
];

const GENERIC_INSIGHT: &str = "See whether you can trim this expense.";

fn category_insight(category: &str) -> &'static str {
    CATEGORY_INSIGHTS
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, insight)| *insight)
        .unwrap_or(GENERIC_INSIGHT)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryInsight {
    pub category: String,
    pub amount: f64,
    pub share: f64,
    pub insight: String,
    pub is_top: bool,
}

/// Top five categories by amount with their share of total expense.
pub fn rank_categories(totals: &[CategoryTotal], total_expense: f64) -> Vec<CategoryInsight> {
    if totals.is_empty() || total_expense == 0.0 {
        return Vec::new();
    }
    let mut sorted: Vec<&CategoryTotal> = totals.iter().collect();
    sorted.sort_by(|a, b| {
        b.amount
            .partial_cmp(&a.amount)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted
        .iter()
        .take(5)
        .enumerate()
        .map(|(i, total)| CategoryInsight {
            category: total.category.clone(),
            amount: total.amount,
            share: round1(total.amount / total_expense * 100.0),
            insight: category_insight(&total.category).to_string(),
            is_top: i == 0,
        })
        .collect()
}

const CATEGORY_TIPS: &[(&str, &str)] = &[
    ("FOOD", "🍽️ Plan your meals and shop with a list to cut food spending."),
    ("ENTERTAINMENT", "🎬 Give entertainment a fixed budget and stop when it runs out."),
    ("TRANSPORT", "🚌 Batch errands and compare transport options before you ride."),
    ("SERVICES", "🔌 Review recurring services and cancel or renegotiate at least one."),
    ("CLOTHING", "👕 Hold clothing purchases for sales and off-season prices."),
    ("HEALTH", "💊 Keep health spending, but ask for generic alternatives."),
];

fn category_tip(category: &str) -> String {
    CATEGORY_TIPS
        .iter()
        .find(|(key, _)| *key == category)
        .map(|(_, tip)| (*tip).to_string())
        .unwrap_or_else(|| format!("🔍 Review your {} spending for quick cuts.", category))
}

/// Up to five tips, in priority order, first occurrence wins on duplicates.
pub fn build_advice(
    income: f64,
    expense: f64,
    savings: f64,
    top_categories: &[CategoryInsight],
) -> Vec<String> {
    let mut tips = Vec::new();
    if savings == 0.0 && income > 0.0 {
        tips.push("🪙 Build an emergency fund worth 3 to 6 months of expenses.".to_string());
        tips.push(format!(
            "🎯 Goal: save {} (10% of your income) next month.",
            fmt_money(income * 0.1)
        ));
    }
    if income > 0.0 && expense <= income && (income - expense) / income < 0.10 {
        tips.push("🧮 Your savings rate is under 10%. Trim one recurring expense.".to_string());
    }
    if expense > income {
        tips.push("📉 Prioritize essential expenses until the balance turns positive.".to_string());
    }
    for category in top_categories.iter().take(2) {
        tips.push(category_tip(&category.category));
    }
    if income > 0.0 && income < 1000.0 {
        tips.push("💼 Look for one extra income stream, however small.".to_string());
    } else if income > 0.0 && income < 3000.0 {
        tips.push("🏦 Automate a transfer to savings every payday.".to_string());
    }
    tips.push("📊 Review your finances weekly.".to_string());
    tips.push("📱 Use the 50/30/20 rule: needs, wants, savings.".to_string());

    let mut seen = HashSet::new();
    tips.retain(|tip| seen.insert(tip.clone()));
    tips.truncate(5);
    tips
}

pub fn next_month_goal(income: f64, expense: f64, savings: f64) -> String {
    if income == 0.0 {
        return "Register your first income.".to_string();
    }
    if income - expense <= 0.0 {
        return "Reduce your expenses until your balance is positive.".to_string();
    }
    if savings == 0.0 {
        return format!(
            "Save {} (10% of your income) next month.",
            fmt_money(income * 0.1)
        );
    }
    format!("Raise your savings to {} next month.", fmt_money(savings * 1.2))
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialReport {
    pub period: Period,
    pub score: HealthScore,
    pub summary: String,
    pub comparison: String,
    pub alerts: Vec<String>,
    pub categories: Vec<CategoryInsight>,
    pub advice: Vec<String>,
    pub next_month_goal: String,
}

/// Gathers the month's aggregates and assembles the full analysis view.
pub fn compute_financial_report(conn: &Connection, period: &Period) -> Result<FinancialReport> {
    let current = compute_monthly_totals(conn, period)?;
    let prior = compute_monthly_totals(conn, &period.prev())?;
    let savings = compute_savings_total(conn)?;
    let debt = compute_outstanding_debt(conn)?;
    let breakdown = compute_category_breakdown(conn, period)?;
    let unfunded = list_unfunded_goal_names(conn)?;

    let categories = rank_categories(&breakdown, current.expense);
    let report = FinancialReport {
        period: *period,
        score: health_score(current.income, current.expense, savings, debt),
        summary: executive_summary(current.income, current.expense),
        comparison: month_comparison(&current, &prior),
        alerts: build_alerts(current.income, current.expense, savings, debt, &unfunded),
        advice: build_advice(current.income, current.expense, savings, &categories),
        next_month_goal: next_month_goal(current.income, current.expense, savings),
        categories,
    };
    debug!(
        year = period.year,
        month = period.month,
        score = report.score.score,
        "assembled financial report"
    );
    Ok(report)
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    pub score: HealthScore,
}

/// The dashboard card: filtered totals plus the score over global
/// savings and debt.
pub fn compute_dashboard_summary(
    conn: &Connection,
    filter: &LedgerFilter,
) -> Result<DashboardSummary> {
    let totals = compute_filtered_totals(conn, filter)?;
    let savings = compute_savings_total(conn)?;
    let debt = compute_outstanding_debt(conn)?;
    Ok(DashboardSummary {
        income: totals.income,
        expense: totals.expense,
        balance: totals.balance(),
        score: health_score(totals.income, totals.expense, savings, debt),
    })
}
