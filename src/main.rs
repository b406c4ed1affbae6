mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod loader;
mod mapper;
mod models;
mod ofx;
mod settings;
mod store;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Init { data_dir, echo_sql }) => cli::init::run(data_dir, echo_sql),
        Some(Commands::Status { db }) => cli::status::run(db.as_deref()),
        Some(Commands::Accounts { db }) => cli::accounts::list(db.as_deref()),
        Some(Commands::Transactions { account, db }) => cli::transactions::list(&account, db.as_deref()),
        None => match cli.file {
            Some(file) => cli::import::run(&file, cli.db.as_deref()),
            None => Cli::command().print_help().map_err(error::Error::from),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
