pub mod accounts;
pub mod import;
pub mod init;
pub mod status;
pub mod transactions;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::{load_settings, resolve_db_path};

/// Open the database selected by `--db` or settings, creating the schema if
/// this is its first use.
pub(crate) fn open_db(db: Option<&str>) -> Result<(PathBuf, rusqlite::Connection)> {
    let settings = load_settings();
    let db_path = resolve_db_path(db, &settings);
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let conn = get_connection(&db_path, settings.echo_sql)?;
    init_db(&conn)?;
    Ok((db_path, conn))
}

#[derive(Parser)]
#[command(
    name = "ofxbook",
    about = "Import OFX bank statements into a local SQLite ledger.",
    args_conflicts_with_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// OFX statement file to import
    pub file: Option<String>,
    /// Database file (default: <data_dir>/ofxbook.db)
    #[arg(long)]
    pub db: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save settings and create the database.
    Init {
        /// Directory for ofxbook data (default: ~/Documents/ofxbook)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Log every SQL statement (RUST_LOG=info to see them)
        #[arg(long = "echo-sql")]
        echo_sql: bool,
    },
    /// Show the database in use and row counts.
    Status {
        #[arg(long)]
        db: Option<String>,
    },
    /// List stored accounts with their latest balances.
    Accounts {
        #[arg(long)]
        db: Option<String>,
    },
    /// List the stored transactions of one account.
    Transactions {
        /// Account number (OFX ACCTID)
        account: String,
        #[arg(long)]
        db: Option<String>,
    },
}
