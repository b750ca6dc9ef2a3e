use std::process::exit;

use clap::Parser;
use log::{debug, error};
use serde::{Deserialize, Serialize};

use anykv::{
    args::{Commands, KvsArgs},
    Lookup, Store,
};

/// What the CLI stores under a key. A table, so every codec accepts it.
#[derive(Serialize, Deserialize)]
struct Entry {
    value: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{:#}", e);
        exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = KvsArgs::parse();
    let config = cli.resolve_config()?;
    debug!("Resolved config: {:?}", config);

    let store = config.open()?;

    match &cli.command {
        Commands::Set { key, value } => store.set(
            key,
            &Entry {
                value: value.clone(),
            },
        )?,
        Commands::Get { key } => match store.get::<Entry>(key)? {
            Lookup::Hit(entry) => println!("{}", entry.value),
            Lookup::Miss => println!("Key not found"),
        },
        Commands::Rm { key } => store.delete(key)?,
    }

    store.close()?;
    Ok(())
}
