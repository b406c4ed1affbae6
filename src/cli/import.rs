use std::path::PathBuf;

use colored::Colorize;

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::importer::import_file;

pub fn run(file: &str, db: Option<&str>) -> Result<()> {
    let file_path = PathBuf::from(file);
    let (_db_path, mut conn) = open_db(db)?;

    let result = import_file(&mut conn, &file_path)?;
    let account = &result.account;

    println!("{} {} (id {})", "Account".bold(), account.number, result.persisted.account_id);
    println!("  Balance: {} as of {}", money(account.balance), account.balance_date);

    match &result.first_transaction {
        Some(t) => {
            println!("{} (of {})", "First transaction".bold(), result.transactions_seen);
            println!("  {}  {}  {}  [{}]  {}", t.date, t.payee, money(t.amount), t.kind, t.foreign_id);
            if !t.memo.is_empty() {
                println!("  {}", t.memo);
            }
        }
        None => println!("{}", "No transactions in statement".dimmed()),
    }

    let persisted = &result.persisted;
    println!(
        "Account: {} inserted, {} updated",
        persisted.account.inserted, persisted.account.updated
    );
    println!(
        "Transactions: {} inserted, {} skipped (duplicates)",
        persisted.transactions_inserted,
        result.transactions_seen - persisted.transactions_inserted
    );
    Ok(())
}
