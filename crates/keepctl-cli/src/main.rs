//! keepctl - manage groups and entries of a KeePass database
//!
//! Each run performs one operation and prints its result as JSON on stdout.

mod config;
mod input;

use anyhow::Result;
use clap::{Parser, Subcommand};
use keepctl_core::{
    session, Defaults, EntryParams, Failure, GroupParams, Invocation, LookupParams, Outcome,
    VaultError,
};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use config::Config;
use input::{typed, Params};

/// keepctl - manage groups and entries of a KeePass database
#[derive(Parser, Debug)]
#[command(name = "keepctl")]
#[command(about = "Create, modify, delete and look up KeePass groups and entries")]
struct Args {
    /// Path to a config file (default: ~/.config/keepctl/keepctl.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    verb: Verb,
}

#[derive(Subcommand, Debug)]
enum Verb {
    /// Create, modify or delete one entry
    Entry(Input),
    /// Create, modify or delete one group
    Group(Input),
    /// Search entries
    Lookup(Input),
}

#[derive(clap::Args, Debug)]
struct Input {
    /// JSON object with the parameters, `-` reads stdin
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Set one parameter, overriding the parameter file
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = input::parse_pair)]
    set: Vec<(String, Value)>,
}

fn main() -> Result<ExitCode> {
    // Logs go to stderr, stdout carries only the result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("keepctl=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match execute(args) {
        Ok(outcome) => {
            print_json(&outcome)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::error!("{err}");
            print_json(&Failure::from(&err))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn execute(args: Args) -> Result<Outcome, VaultError> {
    let config = Config::load(args.config).map_err(plumbing)?;

    let (given, validate): (Input, fn(Params) -> Result<Invocation, VaultError>) = match args.verb {
        Verb::Entry(given) => (given, |p| typed::<EntryParams>(p)?.validate()),
        Verb::Group(given) => (given, |p| typed::<GroupParams>(p)?.validate()),
        Verb::Lookup(given) => (given, |p| typed::<LookupParams>(p)?.validate()),
    };

    let mut params = match &given.params {
        Some(path) => input::read_params_file(path).map_err(plumbing)?,
        None => Params::new(),
    };
    params = input::merge_pairs(params, given.set);
    input::apply_config(&mut params, &config);

    let invocation = validate(params)?;
    dispatch(invocation, config.defaults())
}

fn dispatch(invocation: Invocation, defaults: Defaults) -> Result<Outcome, VaultError> {
    tracing::debug!("Running against {}", invocation.connection.database.display());
    session::run(invocation, defaults)
}

/// Problems with the config or parameter file are the caller's to fix.
fn plumbing(err: anyhow::Error) -> VaultError {
    VaultError::Validation(format!("{err:#}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
