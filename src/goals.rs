use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ledger::{checked_amount, insert_entry, EntryKind};
use crate::resolve_date_local;

#[derive(Debug, Clone, Serialize)]
pub struct SavingsGoal {
    pub id: i64,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub created_date_local: String,
}

pub fn add_savings_goal(
    conn: &Connection,
    name: &str,
    target_amount: f64,
    date_local: Option<String>,
) -> Result<SavingsGoal> {
    let target = checked_amount(target_amount)?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("goal name must not be empty".to_string()));
    }
    let created = resolve_date_local(date_local)?;

    conn.execute(
        "INSERT INTO savings_goals (name, target_amount, current_amount, created_date_local)
         VALUES (?1, ?2, 0, ?3)",
        params![name, target, created],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, name, "created savings goal");
    fetch_goal(conn, id)
}

pub fn list_savings_goals(conn: &Connection) -> Result<Vec<SavingsGoal>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, target_amount, current_amount, created_date_local
         FROM savings_goals ORDER BY id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(SavingsGoal {
            id: row.get(0)?,
            name: row.get(1)?,
            target_amount: row.get(2)?,
            current_amount: row.get(3)?,
            created_date_local: row.get(4)?,
        })
    })?;

    let mut goals = Vec::new();
    for row in rows {
        goals.push(row?);
    }
    Ok(goals)
}

/// Adds funds to a goal and mirrors the movement into the ledger as an
/// expense, in one SQL transaction. The ledger row is what keeps monthly
/// aggregates consistent with goal balances.
pub fn contribute_to_goal(
    conn: &mut Connection,
    goal_id: i64,
    amount: f64,
    date_local: Option<String>,
) -> Result<SavingsGoal> {
    let amount = checked_amount(amount)?;
    let tx = conn.transaction()?;
    let goal = fetch_goal(&tx, goal_id)?;

    tx.execute(
        "UPDATE savings_goals SET current_amount = current_amount + ?1 WHERE id = ?2",
        params![amount, goal_id],
    )?;
    insert_entry(
        &tx,
        EntryKind::Expense,
        Some(format!("CONTRIBUTION TO {}", goal.name)),
        amount,
        Some("SAVINGS".to_string()),
        date_local,
    )?;
    tx.commit()?;

    debug!(goal_id, amount, "recorded goal contribution");
    fetch_goal(conn, goal_id)
}

pub fn delete_savings_goal(conn: &Connection, id: i64) -> Result<()> {
    let affected = conn.execute("DELETE FROM savings_goals WHERE id = ?1", params![id])?;
    if affected == 0 {
        return Err(Error::NotFound {
            entity: "savings goal",
            id,
        });
    }
    debug!(id, "deleted savings goal");
    Ok(())
}

/// Sum of funds saved across every goal.
pub fn compute_savings_total(conn: &Connection) -> Result<f64> {
    let total: f64 = conn.query_row(
        "SELECT COALESCE(SUM(current_amount), 0) FROM savings_goals",
        [],
        |row| row.get(0),
    )?;
    Ok(total)
}

/// Names of goals that have never received a contribution, oldest first.
pub fn list_unfunded_goal_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM savings_goals WHERE current_amount <= 0 ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut names = Vec::new();
    for row in rows {
        names.push(row?);
    }
    Ok(names)
}

fn fetch_goal(conn: &Connection, id: i64) -> Result<SavingsGoal> {
    conn.query_row(
        "SELECT id, name, target_amount, current_amount, created_date_local
         FROM savings_goals WHERE id = ?1",
        [id],
        |row| {
            Ok(SavingsGoal {
                id: row.get(0)?,
                name: row.get(1)?,
                target_amount: row.get(2)?,
                current_amount: row.get(3)?,
                created_date_local: row.get(4)?,
            })
        },
    )
    .map_err(|err| match err {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound {
            entity: "savings goal",
            id,
        },
        other => Error::Database(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::ledger::compute_monthly_totals;
    use crate::Period;

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory");
        init_db(&conn).expect("init schema");
        conn
    }

    #[test]
    fn new_goal_starts_unfunded() {
        let conn = setup_conn();
        let goal = add_savings_goal(&conn, "Vacation", 3000.0, Some("2025-05-01".to_string()))
            .expect("goal");
        assert_eq!(goal.current_amount, 0.0);
        assert_eq!(
            list_unfunded_goal_names(&conn).expect("names"),
            vec!["Vacation".to_string()]
        );
    }

    #[test]
    fn contribution_updates_goal_and_ledger_together() {
        let mut conn = setup_conn();
        let goal = add_savings_goal(&conn, "Vacation", 3000.0, Some("2025-05-01".to_string()))
            .expect("goal");

        let updated =
            contribute_to_goal(&mut conn, goal.id, 250.0, Some("2025-05-10".to_string()))
                .expect("contribute");
        assert_eq!(updated.current_amount, 250.0);

        let period = Period::new(2025, 5).expect("period");
        let totals = compute_monthly_totals(&conn, &period).expect("totals");
        assert_eq!(totals.expense, 250.0);

        assert!(list_unfunded_goal_names(&conn).expect("names").is_empty());
        assert_eq!(compute_savings_total(&conn).expect("total"), 250.0);
    }

    #[test]
    fn contribution_to_missing_goal_leaves_ledger_untouched() {
        let mut conn = setup_conn();
        assert!(matches!(
            contribute_to_goal(&mut conn, 99, 250.0, Some("2025-05-10".to_string())),
            Err(Error::NotFound { .. })
        ));

        let period = Period::new(2025, 5).expect("period");
        let totals = compute_monthly_totals(&conn, &period).expect("totals");
        assert_eq!(totals.expense, 0.0);
    }

    #[test]
    fn savings_total_sums_every_goal() {
        let mut conn = setup_conn();
        let a = add_savings_goal(&conn, "A", 1000.0, Some("2025-05-01".to_string())).expect("goal");
        let b = add_savings_goal(&conn, "B", 1000.0, Some("2025-05-01".to_string())).expect("goal");
        contribute_to_goal(&mut conn, a.id, 100.0, Some("2025-05-10".to_string()))
            .expect("contribute");
        contribute_to_goal(&mut conn, b.id, 40.0, Some("2025-05-11".to_string()))
            .expect("contribute");
        assert_eq!(compute_savings_total(&conn).expect("total"), 140.0);
    }

    #[test]
    fn delete_goal_keeps_its_ledger_history() {
        let mut conn = setup_conn();
        let goal = add_savings_goal(&conn, "Vacation", 3000.0, Some("2025-05-01".to_string()))
            .expect("goal");
        contribute_to_goal(&mut conn, goal.id, 250.0, Some("2025-05-10".to_string()))
            .expect("contribute");
        delete_savings_goal(&conn, goal.id).expect("delete");

        let period = Period::new(2025, 5).expect("period");
        let totals = compute_monthly_totals(&conn, &period).expect("totals");
        assert_eq!(totals.expense, 250.0);
        assert_eq!(compute_savings_total(&conn).expect("total"), 0.0);
    }

    #[test]
    fn rejects_blank_names_and_bad_targets() {
        let conn = setup_conn();
        assert!(add_savings_goal(&conn, "  ", 100.0, None).is_err());
        assert!(add_savings_goal(&conn, "X", 0.0, None).is_err());
    }
}
