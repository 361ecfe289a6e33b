// src/cli.rs
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

use crate::core::profile::ModelKind;
use crate::infra::t;

pub mod commands;

fn build_cli() -> Command {
    let models: Vec<&'static str> = ModelKind::ALL.iter().map(|m| m.cli_name()).collect();

    Command::new("assert-runner")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about").to_string())
        .arg(
            Arg::new("config")
                .help(t!("cli.arg_config").to_string())
                .value_name("CONFIG")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .help(t!("cli.arg_model").to_string())
                .value_name("MODEL")
                .required(true)
                .value_parser(PossibleValuesParser::new(models))
                .action(ArgAction::Set),
        )
}

pub async fn run() -> Result<()> {
    let matches = build_cli().get_matches();

    let config = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("missing configuration path"))?;
    let model = matches
        .get_one::<String>("model")
        .ok_or_else(|| anyhow::anyhow!("missing model"))?
        .parse::<ModelKind>()
        .map_err(anyhow::Error::msg)?;

    commands::run::execute(config, model).await
}
