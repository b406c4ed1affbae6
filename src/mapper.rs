use crate::error::{Error, Result};
use crate::models::{Account, Transaction};
use crate::ofx::{OfxDocument, OfxStatement};

fn statement(doc: &OfxDocument) -> Result<&OfxStatement> {
    doc.statement
        .as_ref()
        .ok_or_else(|| Error::MalformedStatement("no <STMTRS> statement section".into()))
}

/// Account number, ledger balance and statement end date.
pub fn account(doc: &OfxDocument) -> Result<Account> {
    let number = doc
        .account
        .as_ref()
        .ok_or_else(|| Error::MalformedStatement("no account section".into()))?
        .number
        .clone()
        .ok_or_else(|| Error::MalformedStatement("account section has no <ACCTID>".into()))?;
    let stmt = statement(doc)?;
    let balance = stmt
        .balance
        .ok_or_else(|| Error::MalformedStatement("no <LEDGERBAL> balance".into()))?;
    let balance_date = stmt
        .end_date
        .ok_or_else(|| Error::MalformedStatement("no <DTEND> statement end date".into()))?;

    Ok(Account {
        number,
        balance,
        balance_date,
    })
}

/// One `Transaction` per statement entry, last source entry first.
pub fn transactions(doc: &OfxDocument) -> Result<Vec<Transaction>> {
    // Reverse source order: downstream output treats index 0 as the last
    // entry listed in the file.
    Ok(statement(doc)?
        .transactions
        .iter()
        .rev()
        .map(|t| Transaction {
            payee: t.payee.clone(),
            kind: t.kind.clone(),
            date: t.date,
            amount: t.amount,
            foreign_id: t.id.clone(),
            memo: t.memo.clone(),
        })
        .collect())
}
