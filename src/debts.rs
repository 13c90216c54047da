use std::fmt;
use std::str::FromStr;

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::ledger::{checked_amount, insert_entry, EntryKind};
use crate::resolve_date_local;

/// Whether the user owes the money or is owed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtDirection {
    IOwe,
    OwedToMe,
}

impl DebtDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtDirection::IOwe => "I_OWE",
            DebtDirection::OwedToMe => "OWED_TO_ME",
        }
    }
}

impl fmt::Display for DebtDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DebtDirection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "I_OWE" => Ok(DebtDirection::IOwe),
            "OWED_TO_ME" => Ok(DebtDirection::OwedToMe),
            _ => Err(format!("Unknown debt direction: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Debt {
    pub id: i64,
    pub name: String,
    pub total_amount: f64,
    pub paid_amount: f64,
    pub direction: DebtDirection,
    pub created_date_local: String,
}

impl Debt {
    pub fn outstanding(&self) -> f64 {
        (self.total_amount - self.paid_amount).max(0.0)
    }
}

/// Registers a debt. Money someone owes the user entered their pocket at
/// registration time, so that direction also writes an income row to the
/// ledger, atomically with the debt itself.
pub fn add_debt(
    conn: &mut Connection,
    name: &str,
    total_amount: f64,
    direction: DebtDirection,
    date_local: Option<String>,
) -> Result<Debt> {
    let total = checked_amount(total_amount)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("debt name must not be empty".to_string()));
    }
    let created = resolve_date_local(date_local)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO debts (name, total_amount, paid_amount, direction, created_date_local)
         VALUES (?1, ?2, 0, ?3, ?4)",
        params![name, total, direction.as_str(), created],
    )?;
    let id = tx.last_insert_rowid();

    if direction == DebtDirection::OwedToMe {
        insert_entry(
            &tx,
            EntryKind::Income,
            Some(format!("DEBT REGISTERED: {}", name)),
            total,
            Some("DEBT".to_string()),
            Some(created.clone()),
        )?;
    }
    tx.commit()?;

    debug!(id, direction = direction.as_str(), "registered debt");
    fetch_debt(conn, id)
}

pub fn list_debts(conn: &Connection) -> Result<Vec<Debt>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, total_amount, paid_amount, direction, created_date_local
         FROM debts ORDER BY id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        let direction_str: String = row.get(4)?;
        let direction = DebtDirection::from_str(&direction_str).map_err(|_| {
            rusqlite::Error::InvalidColumnType(
                4,
                "direction".to_string(),
                rusqlite::types::Type::Text,
            )
        })?;
        Ok(Debt {
            id: row.get(0)?,
            name: row.get(1)?,
            total_amount: row.get(2)?,
            paid_amount: row.get(3)?,
            direction,
            created_date_local: row.get(5)?,
        })
    })?;

    let mut debts = Vec::new();
    for row in rows {
        debts.push(row?);
    }
    Ok(debts)
}

/// Applies a payment and mirrors it into the ledger: paying down a debt the
/// user owes is an expense, collecting on money owed to the user is income.
/// Both writes happen in one SQL transaction; overpayment is rejected before
/// anything is written.
pub fn record_debt_payment(
    conn: &mut Connection,
    debt_id: i64,
    amount: f64,
    date_local: Option<String>,
) -> Result<Debt> {
    let amount = checked_amount(amount)?;
    let tx = conn.transaction()?;
    let debt = fetch_debt(&tx, debt_id)?;

    if debt.paid_amount + amount > debt.total_amount {
        return Err(Error::InvalidInput(format!(
            "payment of {} exceeds the {} outstanding on {}",
            amount,
            debt.outstanding(),
            debt.name
        )));
    }

    tx.execute(
        "UPDATE debts SET paid_amount = paid_amount + ?1 WHERE id = ?2",
        params![amount, debt_id],
    )?;
    let (kind, description) = match debt.direction {
        DebtDirection::IOwe => (EntryKind::Expense, format!("PAYMENT ON {}", debt.name)),
        DebtDirection::OwedToMe => (EntryKind::Income, format!("COLLECTION ON {}", debt.name)),
    };
    insert_entry(&tx, kind, Some(description), amount, Some("DEBT".to_string()), date_local)?;
    tx.commit()?;

    debug!(debt_id, amount, "recorded debt payment");
    fetch_debt(conn, debt_id)
}

pub fn delete_debt(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM debts WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(Error::NotFound { entity: "debt", id });
    }
    debug!(id, "deleted debt");
    Ok(())
}

/// Unpaid remainder across debts the user owes. Money owed to the user does
/// not count against their score.
pub fn compute_outstanding_debt(conn: &Connection) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(MAX(total_amount - paid_amount, 0)), 0)
         FROM debts WHERE direction = 'I_OWE'",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

fn fetch_debt(conn: &Connection, id: i64) -> Result<Debt> {
    conn.query_row(
        "SELECT id, name, total_amount, paid_amount, direction, created_date_local
         FROM debts WHERE id = ?1",
        [id],
        |row| {
            let direction_str: String = row.get(4)?;
            let direction = DebtDirection::from_str(&direction_str).map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    4,
                    "direction".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?;
            Ok(Debt {
                id: row.get(0)?,
                name: row.get(1)?,
                total_amount: row.get(2)?,
                paid_amount: row.get(3)?,
                direction,
                created_date_local: row.get(5)?,
            })
        },
    )
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound { entity: "debt", id },
        other => Error::Database(other),
    })
}
