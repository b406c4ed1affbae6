use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

// Amounts are TEXT so decimals round-trip exactly.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    number TEXT NOT NULL UNIQUE,
    balance TEXT NOT NULL,
    balance_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL,
    payee TEXT NOT NULL,
    type TEXT NOT NULL,
    date TEXT NOT NULL,
    amount TEXT NOT NULL,
    foreign_id TEXT NOT NULL UNIQUE,
    memo TEXT NOT NULL,
    FOREIGN KEY (account_id) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS idx_transactions_account ON transactions(account_id);
";

pub const SQL_LOG_TARGET: &str = "ofxbook::sql";

fn echo_sql(sql: &str) {
    log::info!(target: SQL_LOG_TARGET, "{sql}");
}

pub fn get_connection(db_path: &Path, echo: bool) -> Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    if echo {
        conn.trace(Some(echo_sql));
    }
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
