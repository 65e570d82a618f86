//! # slotdb CLI Entry Point
//!
//! ```bash
//! # Open (or create) a database and start the REPL
//! slotdb ./my.db
//!
//! # Create with a non-default block width
//! slotdb --block-size 1024 ./my.db
//!
//! # Human-inspectable layout for debugging
//! slotdb --debug-layout ./scratch.db
//! ```

use eyre::{bail, Result, WrapErr};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use slotdb::cli::Repl;
use slotdb::Db;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut block_size: Option<usize> = None;
    let mut debug_layout = false;
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            "--version" | "-v" => {
                println!("slotdb {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--block-size" | "-b" => {
                i += 1;
                let value = args
                    .get(i)
                    .ok_or_else(|| eyre::eyre!("--block-size requires a value"))?;
                block_size = Some(value.parse().wrap_err("invalid block size")?);
            }
            "--debug-layout" => {
                debug_layout = true;
            }
            arg if arg.starts_with('-') => {
                bail!("Unknown option: {}", arg);
            }
            path => {
                if db_path.is_some() {
                    bail!("Multiple database paths specified");
                }
                db_path = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }

    let Some(db_path) = db_path else {
        print_usage();
        return Ok(());
    };

    let mut options = Db::options().debug_layout(debug_layout);
    if let Some(block_size) = block_size {
        options = options.block_size(block_size);
    }

    let db = options
        .open(&db_path)
        .wrap_err_with(|| format!("failed to open database at {:?}", db_path))?;

    let mut repl = Repl::new(db)?;
    repl.run()?;

    Ok(())
}

fn print_usage() {
    println!("slotdb - embedded block-addressed key-value store");
    println!();
    println!("USAGE:");
    println!("    slotdb [OPTIONS] <DATABASE_PATH>");
    println!();
    println!("ARGS:");
    println!("    <DATABASE_PATH>      Path to the database file (.db appended if missing)");
    println!();
    println!("OPTIONS:");
    println!("    -b, --block-size N   Block width for a new database (default 128)");
    println!("        --debug-layout   Newline-terminated blocks, no compression");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version information");
}
