use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Account as reported by one statement, keyed by `number`.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub number: String,
    pub balance: Decimal,
    pub balance_date: NaiveDate,
}

/// Transaction mapped from one statement entry, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub payee: String,
    /// OFX `TRNTYPE`; stored in the `type` column.
    pub kind: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub foreign_id: String,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredAccount {
    pub id: i64,
    pub number: String,
    pub balance: Decimal,
    pub balance_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: i64,
    pub account_id: i64,
    pub payee: String,
    pub kind: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub foreign_id: String,
    pub memo: String,
}
