use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

/// Default database location under the platform data directory.
pub fn default_db_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bolsillo");
    fs::create_dir_all(&data_dir)?;
    Ok(data_dir.join("bolsillo.sqlite"))
}

pub fn open_connection(path: &Path) -> Result<Connection> {
    Ok(Connection::open(path)?)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS transactions (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_utc INTEGER NOT NULL,
          date_local TEXT NOT NULL,
          kind TEXT NOT NULL,
          description TEXT NOT NULL,
          category TEXT NOT NULL DEFAULT 'OTHER',
          amount REAL NOT NULL
        );
        CREATE TABLE IF NOT EXISTS savings_goals (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          target_amount REAL NOT NULL,
          current_amount REAL NOT NULL DEFAULT 0,
          created_date_local TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS debts (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          name TEXT NOT NULL,
          total_amount REAL NOT NULL,
          paid_amount REAL NOT NULL DEFAULT 0,
          direction TEXT NOT NULL,
          created_date_local TEXT NOT NULL
        );",
    )?;

    ensure_transaction_columns(conn)?;
    info!("Database schema initialized");
    Ok(())
}

// Ledgers created before categories existed lack the column.
fn ensure_transaction_columns(conn: &Connection) -> Result<()> {
    if !table_has_column(conn, "transactions", "category")? {
        conn.execute(
            "ALTER TABLE transactions ADD COLUMN category TEXT NOT NULL DEFAULT 'OTHER'",
            [],
        )?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
