use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, ToSql};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::{resolve_date_local, LedgerFilter, Period};

/// Direction tag carried by every ledger row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Income => "INCOME",
            EntryKind::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INCOME" => Ok(EntryKind::Income),
            "EXPENSE" => Ok(EntryKind::Expense),
            _ => Err(format!("Unknown entry kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub ts_utc: i64,
    pub date_local: String,
    pub kind: EntryKind,
    pub description: String,
    pub category: String,
    pub amount: f64,
}

/// Summed income and expense for one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    pub income: f64,
    pub expense: f64,
}

impl MonthlyAggregate {
    pub fn balance(&self) -> f64 {
        self.income - self.expense
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: f64,
}

pub(crate) fn checked_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "amount must be a positive number, got {}",
            amount
        )));
    }
    Ok(amount)
}

fn normalize_text(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(raw) => {
            let trimmed = raw.trim().to_uppercase();
            if trimmed.is_empty() {
                fallback.to_string()
            } else {
                trimmed
            }
        }
        None => fallback.to_string(),
    }
}

pub fn add_income(
    conn: &Connection,
    description: Option<String>,
    amount: f64,
    category: Option<String>,
    date_local: Option<String>,
) -> Result<Transaction> {
    insert_entry(conn, EntryKind::Income, description, amount, category, date_local)
}

pub fn add_expense(
    conn: &Connection,
    description: Option<String>,
    amount: f64,
    category: Option<String>,
    date_local: Option<String>,
) -> Result<Transaction> {
    insert_entry(conn, EntryKind::Expense, description, amount, category, date_local)
}

pub(crate) fn insert_entry(
    conn: &Connection,
    kind: EntryKind,
    description: Option<String>,
    amount: f64,
    category: Option<String>,
    date_local: Option<String>,
) -> Result<Transaction> {
    let amount = checked_amount(amount)?;
    let description = normalize_text(description, "NO DESCRIPTION");
    let category = normalize_text(category, "OTHER");
    let date_local = resolve_date_local(date_local)?;
    let ts_utc = Utc::now().timestamp_millis();

    conn.execute(
        "INSERT INTO transactions (ts_utc, date_local, kind, description, category, amount)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![ts_utc, date_local, kind.as_str(), description, category, amount],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, kind = kind.as_str(), amount, "recorded transaction");

    Ok(Transaction {
        id,
        ts_utc,
        date_local,
        kind,
        description,
        category,
        amount,
    })
}

pub fn list_transactions(conn: &Connection, filter: &LedgerFilter) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, ts_utc, date_local, kind, description, category, amount FROM transactions
         WHERE substr(date_local, 1, 4) = ?1 AND substr(date_local, 6, 2) = ?2",
    );
    let year = filter.period.year_str();
    let month = filter.period.month_str();
    let day = filter.day.map(|d| format!("{:02}", d));
    let mut args: Vec<&dyn ToSql> = vec![&year, &month];
    if let Some(ref day) = day {
        sql.push_str(" AND substr(date_local, 9, 2) = ?3");
        args.push(day);
    }
    sql.push_str(" ORDER BY ts_utc DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args.as_slice(), |row| {
        let kind_str: String = row.get(3)?;
        let kind = EntryKind::from_str(&kind_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(3, "kind".to_string(), rusqlite::types::Type::Text)
        })?;
        Ok(Transaction {
            id: row.get(0)?,
            ts_utc: row.get(1)?,
            date_local: row.get(2)?,
            kind,
            description: row.get(4)?,
            category: row.get(5)?,
            amount: row.get(6)?,
        })
    })?;

    let mut transactions = Vec::new();
    for row in rows {
        transactions.push(row?);
    }
    Ok(transactions)
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(Error::NotFound {
            entity: "transaction",
            id,
        });
    }
    debug!(id, "deleted transaction");
    Ok(())
}

/// Summed income and expense for the filtered slice of the ledger.
pub fn compute_filtered_totals(
    conn: &Connection,
    filter: &LedgerFilter,
) -> Result<MonthlyAggregate> {
    let mut sql = String::from(
        "SELECT kind, COALESCE(SUM(amount), 0) FROM transactions
         WHERE substr(date_local, 1, 4) = ?1 AND substr(date_local, 6, 2) = ?2",
    );
    let year = filter.period.year_str();
    let month = filter.period.month_str();
    let day = filter.day.map(|d| format!("{:02}", d));
    let mut args: Vec<&dyn ToSql> = vec![&year, &month];
    if let Some(ref day) = day {
        sql.push_str(" AND substr(date_local, 9, 2) = ?3");
        args.push(day);
    }
    sql.push_str(" GROUP BY kind");

    let mut stmt = conn.prepare(&sql)?;
    let mut totals = MonthlyAggregate::default();
    let mut rows = stmt.query(args.as_slice())?;
    while let Some(row) = rows.next()? {
        let kind: String = row.get(0)?;
        let total: f64 = row.get(1)?;
        match kind.as_str() {
            "INCOME" => totals.income = total,
            "EXPENSE" => totals.expense = total,
            _ => {}
        }
    }
    Ok(totals)
}

pub fn compute_monthly_totals(conn: &Connection, period: &Period) -> Result<MonthlyAggregate> {
    compute_filtered_totals(conn, &LedgerFilter::month(*period))
}

/// Expense totals per category for one month, largest first.
pub fn compute_category_breakdown(
    conn: &Connection,
    period: &Period,
) -> Result<Vec<CategoryTotal>> {
    let mut stmt = conn.prepare(
        "SELECT category, SUM(amount) FROM transactions
         WHERE kind = 'EXPENSE' AND substr(date_local, 1, 4) = ?1 AND substr(date_local, 6, 2) = ?2
         GROUP BY category ORDER BY SUM(amount) DESC",
    )?;
    let rows = stmt.query_map(params![period.year_str(), period.month_str()], |row| {
        Ok(CategoryTotal {
            category: row.get(0)?,
            amount: row.get(1)?,
        })
    })?;

    let mut breakdown = Vec::new();
    for row in rows {
        breakdown.push(row?);
    }
    Ok(breakdown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory");
        init_db(&conn).expect("init schema");
        conn
    }

    fn date(day: &str) -> Option<String> {
        Some(format!("2025-05-{}", day))
    }

    #[test]
    fn add_income_normalizes_and_defaults_fields() {
        let conn = setup_conn();
        let tx = add_income(&conn, Some("  salary  ".to_string()), 1500.0, None, date("10"))
            .expect("insert");
        assert_eq!(tx.kind, EntryKind::Income);
        assert_eq!(tx.description, "SALARY");
        assert_eq!(tx.category, "OTHER");
        assert_eq!(tx.amount, 1500.0);
    }

    #[test]
    fn blank_description_falls_back() {
        let conn = setup_conn();
        let tx = add_expense(&conn, Some("   ".to_string()), 10.0, Some("food".to_string()), date("10"))
            .expect("insert");
        assert_eq!(tx.description, "NO DESCRIPTION");
        assert_eq!(tx.category, "FOOD");
    }

    #[test]
    fn rejects_non_positive_and_non_finite_amounts() {
        let conn = setup_conn();
        assert!(add_income(&conn, None, 0.0, None, date("10")).is_err());
        assert!(add_income(&conn, None, -5.0, None, date("10")).is_err());
        assert!(add_income(&conn, None, f64::NAN, None, date("10")).is_err());
        assert!(add_income(&conn, None, f64::INFINITY, None, date("10")).is_err());
    }

    #[test]
    fn list_filters_by_month_and_day() {
        let conn = setup_conn();
        add_income(&conn, None, 100.0, None, date("10")).expect("insert");
        add_income(&conn, None, 200.0, None, date("11")).expect("insert");
        add_income(&conn, None, 300.0, None, Some("2025-04-10".to_string())).expect("insert");

        let period = Period::new(2025, 5).expect("period");
        let month = list_transactions(&conn, &LedgerFilter::month(period)).expect("list");
        assert_eq!(month.len(), 2);

        let day = list_transactions(&conn, &LedgerFilter::day(period, 10)).expect("list");
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].amount, 100.0);
    }

    #[test]
    fn delete_removes_row_and_reports_missing_ids() {
        let conn = setup_conn();
        let tx = add_income(&conn, None, 100.0, None, date("10")).expect("insert");
        delete_transaction(&conn, tx.id).expect("delete");
        assert!(matches!(
            delete_transaction(&conn, tx.id),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn monthly_totals_sum_by_kind() {
        let conn = setup_conn();
        add_income(&conn, None, 1000.0, None, date("01")).expect("insert");
        add_income(&conn, None, 500.0, None, date("15")).expect("insert");
        add_expense(&conn, None, 300.0, Some("FOOD".to_string()), date("16")).expect("insert");

        let period = Period::new(2025, 5).expect("period");
        let totals = compute_monthly_totals(&conn, &period).expect("totals");
        assert_eq!(totals.income, 1500.0);
        assert_eq!(totals.expense, 300.0);
        assert_eq!(totals.balance(), 1200.0);
    }

    #[test]
    fn filtered_totals_respect_day() {
        let conn = setup_conn();
        add_expense(&conn, None, 50.0, None, date("10")).expect("insert");
        add_expense(&conn, None, 70.0, None, date("11")).expect("insert");

        let period = Period::new(2025, 5).expect("period");
        let totals =
            compute_filtered_totals(&conn, &LedgerFilter::day(period, 11)).expect("totals");
        assert_eq!(totals.expense, 70.0);
        assert_eq!(totals.income, 0.0);
    }

    #[test]
    fn category_breakdown_orders_by_amount() {
        let conn = setup_conn();
        add_expense(&conn, None, 50.0, Some("FOOD".to_string()), date("10")).expect("insert");
        add_expense(&conn, None, 120.0, Some("TRANSPORT".to_string()), date("11")).expect("insert");
        add_expense(&conn, None, 30.0, Some("FOOD".to_string()), date("12")).expect("insert");
        add_income(&conn, None, 1000.0, Some("SALARY".to_string()), date("01")).expect("insert");

        let period = Period::new(2025, 5).expect("period");
        let breakdown = compute_category_breakdown(&conn, &period).expect("breakdown");
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown[0].category, "TRANSPORT");
        assert_eq!(breakdown[0].amount, 120.0);
        assert_eq!(breakdown[1].category, "FOOD");
        assert_eq!(breakdown[1].amount, 80.0);
    }

    #[test]
    fn empty_month_yields_zero_totals() {
        let conn = setup_conn();
        let period = Period::new(2025, 5).expect("period");
        let totals = compute_monthly_totals(&conn, &period).expect("totals");
        assert_eq!(totals, MonthlyAggregate::default());
    }
}
