use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::open_db;
use crate::error::{Error, Result};
use crate::fmt::money;
use crate::store::{find_account, list_transactions};

pub fn list(number: &str, db: Option<&str>) -> Result<()> {
    let (_db_path, conn) = open_db(db)?;
    let account = find_account(&conn, number)?.ok_or_else(|| Error::UnknownAccount(number.to_string()))?;
    let rows = list_transactions(&conn, account.id)?;
    if rows.is_empty() {
        println!("No transactions stored for account {}.", account.number);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Payee", "Amount", "Type", "FITID", "Memo"]);
    for t in rows {
        table.add_row(vec![
            Cell::new(t.date),
            Cell::new(t.payee),
            Cell::new(money(t.amount)).set_alignment(CellAlignment::Right),
            Cell::new(t.kind),
            Cell::new(t.foreign_id),
            Cell::new(t.memo),
        ]);
    }
    println!("Transactions for {} (balance {} as of {})\n{table}", account.number, money(account.balance), account.balance_date);
    Ok(())
}
