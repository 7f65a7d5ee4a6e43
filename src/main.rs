//! Ledger Export CLI
//!
//! Loads a ledger snapshot from CSV and writes the transactions modified
//! since the last successful export in GnuCash CSV format.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- accounts.csv splits.csv transactions.csv --separator ';'
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `info` to control logging verbosity

use ledger_export::{
    CliConfig, CsvTransactionsExporter, ExportCheckpoint, FileCheckpoint, InMemoryLedger,
};
use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::process;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CliConfig::from_args(env::args().skip(1))?;

    let accounts = BufReader::new(File::open(&config.accounts_path)?);
    let splits = BufReader::new(File::open(&config.splits_path)?);
    let ledger = InMemoryLedger::from_csv(accounts, splits)?;

    let checkpoint = ExportCheckpoint::new(FileCheckpoint::new(&config.checkpoint_path));
    let exporter = CsvTransactionsExporter::new(config.params, &ledger, &checkpoint);

    let files = exporter.generate_export()?;
    for file in files {
        println!("{}", file.display());
    }

    Ok(())
}
