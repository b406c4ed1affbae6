use std::path::Path;

use log::{debug, info};
use rusqlite::Connection;

use crate::error::Result;
use crate::loader::StatementLoader;
use crate::mapper;
use crate::models::{Account, Transaction};
use crate::store::{self, PersistResult};

#[derive(Debug)]
pub struct ImportResult {
    pub account: Account,
    /// Index 0 of the mapped batch, i.e. the last entry in the file.
    pub first_transaction: Option<Transaction>,
    pub transactions_seen: usize,
    pub persisted: PersistResult,
}

/// Load, map and persist one statement. Mapping failures abort before
/// anything is written; storage failures roll the whole import back.
pub fn import_file(conn: &mut Connection, file_path: &Path) -> Result<ImportResult> {
    let mut loader = StatementLoader::new(file_path);

    if let Some(stmt) = &loader.statement()?.statement {
        debug!(
            "statement {} to {} in {}",
            stmt.start_date.map_or("?".to_string(), |d| d.to_string()),
            stmt.end_date.map_or("?".to_string(), |d| d.to_string()),
            stmt.currency.as_deref().unwrap_or("?")
        );
    }
    let account = mapper::account(loader.statement()?)?;
    let transactions = mapper::transactions(loader.statement()?)?;
    info!(
        "mapped account {} with {} transactions from {}",
        account.number,
        transactions.len(),
        loader.path().display()
    );

    let persisted = store::persist(conn, &account, &transactions)?;
    info!(
        "account {}: {} inserted, {} updated; {} new transactions",
        account.number, persisted.account.inserted, persisted.account.updated, persisted.transactions_inserted
    );

    Ok(ImportResult {
        transactions_seen: transactions.len(),
        first_transaction: transactions.into_iter().next(),
        account,
        persisted,
    })
}
