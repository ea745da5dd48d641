//! Subcommand execution
//!
//! Output goes to the given writer; logs go to stderr.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::io::Write;

use kv_resolver::{KeyValueResolver, ManagedResolver, MapBackedDomainResolver, Value};

use crate::cli::Command;

pub fn run<W: Write>(resolver: &KeyValueResolver, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Dump { key: None } => resolver.dump_to(out)?,
        Command::Dump { key: Some(key) } => match ManagedResolver::dump_key(resolver, &key)? {
            Some(dump) => writeln!(out, "{}", dump)?,
            None => bail!("Key '{}' is not defined", key.trim()),
        },
        Command::Domains => writeln!(out, "{}", resolver.domains().join(", "))?,
        Command::Get {
            key,
            values,
            change_sets,
        } => {
            let lookup = lookup_for(resolver, &values, change_sets);
            match resolver.get(&key, &lookup)? {
                Some(value) => writeln!(out, "{}", value)?,
                None => bail!("No value for '{}' with {}", key.trim(), lookup),
            }
        }
        Command::Set {
            key,
            value,
            values,
            change_set,
            description,
        } => {
            let stored = resolver.set_with_change_set(
                &key,
                Value::parse_lenient(&value),
                description.as_deref(),
                change_set.as_deref(),
                &as_strs(&values),
            )?;
            tracing::info!(key = %key.trim(), pattern = %stored.pattern(), "Stored value");
            writeln!(out, "Stored {}", stored)?;
        }
        Command::Remove {
            key,
            values,
            change_set,
        } => {
            match resolver.remove_with_change_set(&key, change_set.as_deref(), &as_strs(&values))? {
                Some(removed) => writeln!(out, "Removed {}", removed)?,
                None => writeln!(out, "Nothing stored there for '{}'", key.trim())?,
            }
        }
        Command::RemoveKey { key } => match resolver.remove_key(&key)? {
            Some(_) => writeln!(out, "Removed key '{}'", key.trim())?,
            None => writeln!(out, "Key '{}' was not defined", key.trim())?,
        },
        Command::RemoveChangeSet { name } => {
            resolver.remove_change_set(&name)?;
            writeln!(out, "Removed change set '{}'", name)?;
        }
        Command::Mappings {
            values,
            change_sets,
        } => {
            let lookup = lookup_for(resolver, &values, change_sets);
            let mappings: BTreeMap<String, Value> = resolver.get_all_mappings(&lookup)?.into_iter().collect();
            for (key, value) in mappings {
                writeln!(out, "{} = {}", key, value)?;
            }
        }
    }
    Ok(())
}

fn lookup_for(
    resolver: &KeyValueResolver,
    values: &[String],
    change_sets: Vec<String>,
) -> MapBackedDomainResolver {
    resolver
        .resolver_for(&as_strs(values))
        .with_change_sets(change_sets)
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}
