//! Commands and Subcommands for kvs

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{config::EngineKind, Config, Encoding, Result};

/// Args for kvs
#[derive(Parser)]
#[clap(author, version, about)]
#[clap(propagate_version = true)]
pub struct KvsArgs {
    /// TOML config file selecting engine, codec and engine settings
    #[clap(short, long, value_parser)]
    pub config: Option<PathBuf>,
    /// Storage engine, overrides the config file. Default is bitcask
    #[clap(short, long, value_enum)]
    pub engine: Option<EngineKind>,
    /// Value codec, overrides the config file. Default is json
    #[clap(long, value_enum)]
    pub codec: Option<Encoding>,
    /// Data location of the engine, overrides the config file
    #[clap(short, long, value_parser)]
    pub path: Option<PathBuf>,
    /// Subcommand
    #[clap(subcommand)]
    pub command: Commands,
}

/// Enum type of subcommand for kvs
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set the value of a string key to a string
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },
    /// Get the string value of a given string key
    Get {
        /// Key
        key: String,
    },
    /// Remove a given key
    Rm {
        /// Key
        key: String,
    },
}

impl KvsArgs {
    /// The config file, if any, with the command line flags applied on top.
    pub fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(engine) = self.engine {
            config.engine = engine;
        }
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        if let Some(path) = &self.path {
            config.path = Some(path.clone());
        }
        Ok(config)
    }
}
