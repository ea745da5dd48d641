use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kvr")]
#[command(about = "Inspect and edit domain-specific key/values")]
#[command(version)]
/// Command-line arguments.
pub struct Cli {
    /// Directory holding `default.*` and `{env}.*` settings files
    #[arg(long, short = 'c', default_value = "config")]
    pub config_dir: PathBuf,

    /// Settings environment layered over the defaults, `KVR_ENV` when omitted
    #[arg(long, short = 'e')]
    pub env: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every key, or only the given key
    Dump {
        key: Option<String>,
    },
    /// Print the registered domains
    Domains,
    /// Resolve a key for positional domain values
    Get {
        key: String,
        /// Domain values in domain order
        values: Vec<String>,
        /// Active change set, may be repeated
        #[arg(long = "change-set", short = 's')]
        change_sets: Vec<String>,
    },
    /// Store a value under positional domain values
    Set {
        key: String,
        value: String,
        /// Domain values in domain order; `*` or blank for any
        values: Vec<String>,
        #[arg(long = "change-set", short = 's')]
        change_set: Option<String>,
        #[arg(long, short = 'd')]
        description: Option<String>,
    },
    /// Remove the value stored exactly under positional domain values
    Remove {
        key: String,
        values: Vec<String>,
        #[arg(long = "change-set", short = 's')]
        change_set: Option<String>,
    },
    /// Remove a whole key
    RemoveKey {
        key: String,
    },
    /// Remove every value of a change set
    RemoveChangeSet {
        name: String,
    },
    /// Resolve every key for positional domain values
    Mappings {
        values: Vec<String>,
        #[arg(long = "change-set", short = 's')]
        change_sets: Vec<String>,
    },
}
