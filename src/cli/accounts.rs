use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::Result;
use crate::fmt::money;
use crate::store::list_accounts;

pub fn list(db: Option<&str>) -> Result<()> {
    let (_db_path, conn) = open_db(db)?;
    let rows = list_accounts(&conn)?;
    if rows.is_empty() {
        println!("No accounts yet. Import a statement with `ofxbook <FILE>`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Number", "Balance", "As Of", "Transactions"]);
    for (account, txn_count) in rows {
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(account.number),
            Cell::new(money(account.balance)).set_alignment(CellAlignment::Right),
            Cell::new(account.balance_date),
            Cell::new(txn_count).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
