//! Reconciles mapped statements against what is already stored.
//!
//! Accounts are upserted on `number`; transactions are inserted once per
//! `foreign_id` and never touched again. Both happen inside one SQLite
//! transaction per import. Only one writer is expected: there is no locking
//! beyond what that transaction provides.

use std::str::FromStr;

use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{Account, StoredAccount, StoredTransaction, Transaction};

/// Row counts from `upsert_account`. Exactly one side is non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountUpsert {
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistResult {
    pub account_id: i64,
    pub account: AccountUpsert,
    pub transactions_inserted: usize,
}

fn decimal_column(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn stored_account(row: &Row) -> rusqlite::Result<StoredAccount> {
    Ok(StoredAccount {
        id: row.get(0)?,
        number: row.get(1)?,
        balance: decimal_column(row, 2)?,
        balance_date: row.get(3)?,
    })
}

/// Insert the account, or refresh its balance if `number` already exists.
pub fn upsert_account(conn: &Connection, account: &Account) -> Result<AccountUpsert> {
    let balance = account.balance.to_string();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO accounts (number, balance, balance_date) VALUES (?1, ?2, ?3)",
        rusqlite::params![account.number, balance, account.balance_date],
    )?;
    if inserted > 0 {
        debug!("account {} inserted", account.number);
        return Ok(AccountUpsert { inserted, updated: 0 });
    }

    let updated = conn.execute(
        "UPDATE accounts SET balance = ?1, balance_date = ?2 WHERE number = ?3",
        rusqlite::params![balance, account.balance_date, account.number],
    )?;
    debug!("account {} updated ({updated} row)", account.number);
    Ok(AccountUpsert { inserted: 0, updated })
}

/// Insert the batch, skipping any `foreign_id` already stored. Returns the
/// number of new rows.
pub fn insert_transactions(conn: &Connection, account_id: i64, transactions: &[Transaction]) -> Result<usize> {
    let mut stmt = conn.prepare_cached(
        "INSERT OR IGNORE INTO transactions (account_id, payee, type, date, amount, foreign_id, memo) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    let mut inserted = 0usize;
    for t in transactions {
        inserted += stmt.execute(rusqlite::params![
            account_id,
            t.payee,
            t.kind,
            t.date,
            t.amount.to_string(),
            t.foreign_id,
            t.memo,
        ])?;
    }
    debug!(
        "{inserted} of {} transactions inserted, {} already present",
        transactions.len(),
        transactions.len() - inserted
    );
    Ok(inserted)
}

/// Account upsert and transaction insert, committed together or not at all.
pub fn persist(conn: &mut Connection, account: &Account, transactions: &[Transaction]) -> Result<PersistResult> {
    let tx = conn.transaction()?;
    let account_write = upsert_account(&tx, account)?;
    let account_id: i64 = tx.query_row(
        "SELECT id FROM accounts WHERE number = ?1",
        [&account.number],
        |row| row.get(0),
    )?;
    let transactions_inserted = insert_transactions(&tx, account_id, transactions)?;
    tx.commit()?;

    Ok(PersistResult {
        account_id,
        account: account_write,
        transactions_inserted,
    })
}

pub fn find_account(conn: &Connection, number: &str) -> Result<Option<StoredAccount>> {
    let account = conn
        .query_row(
            "SELECT id, number, balance, balance_date FROM accounts WHERE number = ?1",
            [number],
            stored_account,
        )
        .optional()?;
    Ok(account)
}

/// All accounts with their stored transaction counts.
pub fn list_accounts(conn: &Connection) -> Result<Vec<(StoredAccount, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.number, a.balance, a.balance_date, \
         (SELECT count(*) FROM transactions t WHERE t.account_id = a.id) \
         FROM accounts a ORDER BY a.number",
    )?;
    let rows = stmt
        .query_map([], |row| Ok((stored_account(row)?, row.get(4)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Stored transactions for one account in insertion order.
pub fn list_transactions(conn: &Connection, account_id: i64) -> Result<Vec<StoredTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, payee, type, date, amount, foreign_id, memo \
         FROM transactions WHERE account_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([account_id], |row| {
            Ok(StoredTransaction {
                id: row.get(0)?,
                account_id: row.get(1)?,
                payee: row.get(2)?,
                kind: row.get(3)?,
                date: row.get(4)?,
                amount: decimal_column(row, 5)?,
                foreign_id: row.get(6)?,
                memo: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn count_accounts(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM accounts", [], |r| r.get(0))?)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::error::Error;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db"), false).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn account(balance: Decimal, balance_date: NaiveDate) -> Account {
        Account {
            number: "12345".into(),
            balance,
            balance_date,
        }
    }

    fn txn(id: &str, amount: Decimal) -> Transaction {
        Transaction {
            payee: format!("PAYEE {id}"),
            kind: "debit".into(),
            date: date(2023, 12, 15),
            amount,
            foreign_id: id.into(),
            memo: String::new(),
        }
    }

    fn stored_ids(conn: &Connection, account_id: i64) -> Vec<String> {
        list_transactions(conn, account_id)
            .unwrap()
            .into_iter()
            .map(|t| t.foreign_id)
            .collect()
    }

    #[test]
    fn test_upsert_inserts_new_account() {
        let (_dir, conn) = test_db();
        let res = upsert_account(&conn, &account(dec!(100.00), date(2024, 1, 1))).unwrap();
        assert_eq!(res, AccountUpsert { inserted: 1, updated: 0 });
        let stored = find_account(&conn, "12345").unwrap().unwrap();
        assert_eq!(stored.balance, dec!(100.00));
        assert_eq!(stored.balance_date, date(2024, 1, 1));
    }

    #[test]
    fn test_upsert_updates_existing_account() {
        let (_dir, conn) = test_db();
        upsert_account(&conn, &account(dec!(100.00), date(2024, 1, 1))).unwrap();
        let res = upsert_account(&conn, &account(dec!(250.75), date(2024, 2, 1))).unwrap();
        assert_eq!(res, AccountUpsert { inserted: 0, updated: 1 });
        assert_eq!(count_accounts(&conn).unwrap(), 1);
        let stored = find_account(&conn, "12345").unwrap().unwrap();
        assert_eq!(stored.balance, dec!(250.75));
        assert_eq!(stored.balance_date, date(2024, 2, 1));
    }

    #[test]
    fn test_balance_round_trips_exactly() {
        let (_dir, conn) = test_db();
        upsert_account(&conn, &account(dec!(0.10) + dec!(0.20), date(2024, 1, 1))).unwrap();
        let stored = find_account(&conn, "12345").unwrap().unwrap();
        assert_eq!(stored.balance, dec!(0.30));
        assert_eq!(stored.balance.to_string(), "0.30");
    }

    #[test]
    fn test_insert_transactions_skips_duplicates() {
        let (_dir, conn) = test_db();
        upsert_account(&conn, &account(dec!(0), date(2024, 1, 1))).unwrap();
        let id = find_account(&conn, "12345").unwrap().unwrap().id;

        let first = insert_transactions(&conn, id, &[txn("t2", dec!(50.00)), txn("t1", dec!(-20.00))]).unwrap();
        assert_eq!(first, 2);
        let again = insert_transactions(&conn, id, &[txn("t2", dec!(50.00)), txn("t1", dec!(-20.00))]).unwrap();
        assert_eq!(again, 0);
        assert_eq!(count_transactions(&conn).unwrap(), 2);
    }

    #[test]
    fn test_insert_transactions_adds_only_unseen() {
        let (_dir, conn) = test_db();
        upsert_account(&conn, &account(dec!(0), date(2024, 1, 1))).unwrap();
        let id = find_account(&conn, "12345").unwrap().unwrap().id;
        insert_transactions(&conn, id, &[txn("t2", dec!(50.00)), txn("t1", dec!(-20.00))]).unwrap();

        let n = insert_transactions(
            &conn,
            id,
            &[txn("t3", dec!(7.00)), txn("t2", dec!(50.00)), txn("t1", dec!(-20.00))],
        )
        .unwrap();
        assert_eq!(n, 1);
        assert_eq!(stored_ids(&conn, id), vec!["t2", "t1", "t3"]);
    }

    #[test]
    fn test_duplicate_is_not_updated() {
        let (_dir, conn) = test_db();
        upsert_account(&conn, &account(dec!(0), date(2024, 1, 1))).unwrap();
        let id = find_account(&conn, "12345").unwrap().unwrap().id;
        insert_transactions(&conn, id, &[txn("t1", dec!(-20.00))]).unwrap();
        insert_transactions(&conn, id, &[txn("t1", dec!(-99.00))]).unwrap();
        let stored = list_transactions(&conn, id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].amount, dec!(-20.00));
    }

    #[test]
    fn test_persist_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let acct = account(dec!(100.00), date(2024, 1, 1));
        let txns = vec![txn("t2", dec!(50.00)), txn("t1", dec!(-20.00))];

        let first = persist(&mut conn, &acct, &txns).unwrap();
        assert_eq!(first.account, AccountUpsert { inserted: 1, updated: 0 });
        assert_eq!(first.transactions_inserted, 2);

        let second = persist(&mut conn, &acct, &txns).unwrap();
        assert_eq!(second.account, AccountUpsert { inserted: 0, updated: 1 });
        assert_eq!(second.transactions_inserted, 0);
        assert_eq!(second.account_id, first.account_id);

        assert_eq!(count_accounts(&conn).unwrap(), 1);
        assert_eq!(stored_ids(&conn, first.account_id), vec!["t2", "t1"]);
    }

    #[test]
    fn test_persist_rolls_back_on_failure() {
        let (_dir, mut conn) = test_db();
        conn.execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON transactions \
             WHEN NEW.foreign_id = 'boom' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

        let acct = account(dec!(100.00), date(2024, 1, 1));
        let err = persist(&mut conn, &acct, &[txn("ok", dec!(1)), txn("boom", dec!(2))]).unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert_eq!(count_accounts(&conn).unwrap(), 0);
        assert_eq!(count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_list_accounts_counts_transactions() {
        let (_dir, mut conn) = test_db();
        persist(&mut conn, &account(dec!(5), date(2024, 1, 1)), &[txn("a", dec!(1)), txn("b", dec!(2))]).unwrap();
        let rows = list_accounts(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.number, "12345");
        assert_eq!(rows[0].1, 2);
    }

    #[test]
    fn test_find_account_and_list_transactions() {
        let (_dir, mut conn) = test_db();
        let result = persist(&mut conn, &account(dec!(5), date(2024, 1, 1)), &[txn("a", dec!(1)), txn("b", dec!(-2.50))]).unwrap();
        let stored = find_account(&conn, "12345").unwrap().unwrap();
        assert_eq!(stored.id, result.account_id);
        assert_eq!(stored.balance, dec!(5));

        let txns = list_transactions(&conn, stored.id).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[1].foreign_id, "b");
        assert_eq!(txns[1].amount, dec!(-2.50));
        assert_eq!(txns[1].account_id, stored.id);
    }

    #[test]
    fn test_find_account_missing() {
        let (_dir, conn) = test_db();
        assert!(find_account(&conn, "nope").unwrap().is_none());
    }
}
