use crate::cli::open_db;
use crate::error::Result;
use crate::settings::load_settings;
use crate::store::{count_accounts, count_transactions};

pub fn run(db: Option<&str>) -> Result<()> {
    let settings = load_settings();
    println!("Data dir:      {}", settings.data_dir);
    println!("SQL echo:      {}", if settings.echo_sql { "on" } else { "off" });

    let (db_path, conn) = open_db(db)?;
    println!("Database:      {}", db_path.display());
    println!();
    println!("Accounts:      {}", count_accounts(&conn)?);
    println!("Transactions:  {}", count_transactions(&conn)?);
    Ok(())
}
