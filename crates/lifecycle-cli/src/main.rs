//! `lifecycle` command-line interface

mod commands;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lifecycle_audit::BackgroundAuditWriter;
use lifecycle_core::{Lifecycle, LifecycleConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn id_arg() -> Arg {
    Arg::new("id").required(true).help("Entity id (ULID)")
}

fn build_cli() -> Command {
    Command::new("lifecycle")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Move workflow entities through discovery, spec, development and completion")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Directory holding entity documents (overrides config)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("create")
                .about("Create an entity in discovery")
                .arg(
                    Arg::new("actor")
                        .long("actor")
                        .default_value("cli")
                        .help("Who is creating the entity"),
                )
                .arg(
                    Arg::new("payload")
                        .long("payload")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file with the initial payload"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show an entity after migration and history repair")
                .arg(id_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full document"),
                ),
        )
        .subcommand(
            Command::new("migrate")
                .about("Migrate stored documents to the current schema")
                .arg(Arg::new("id").required_unless_present("all").help("Entity id (ULID)"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("id")
                        .help("Migrate every stored document"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("all")
                        .help("Report what would change without saving"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check whether an entity may move to a phase")
                .arg(id_arg())
                .arg(Arg::new("phase").required(true).help("Target phase")),
        )
        .subcommand(
            Command::new("transition")
                .about("Move an entity to the next phase")
                .arg(id_arg())
                .arg(Arg::new("phase").required(true).help("Target phase"))
                .arg(
                    Arg::new("actor")
                        .long("actor")
                        .default_value("cli")
                        .help("Who is making the change"),
                )
                .arg(Arg::new("notes").long("notes").help("Free-text note for the history")),
        )
        .subcommand(
            Command::new("status")
                .about("Set the status within the current phase")
                .arg(id_arg())
                .arg(Arg::new("status").required(true).help("New status")),
        )
        .subcommand(
            Command::new("history")
                .about("List phase transitions")
                .arg(id_arg()),
        )
        .subcommand(
            Command::new("progress")
                .about("Show phase progress")
                .arg(id_arg())
                .arg(
                    Arg::new("phase")
                        .long("phase")
                        .help("Only this phase (default: every phase)"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<LifecycleConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => LifecycleConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LifecycleConfig::default(),
    };
    if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
        config = config.with_data_dir(dir);
    }
    Ok(config)
}

async fn run(matches: ArgMatches) -> anyhow::Result<ExitCode> {
    let config = load_config(&matches)?;
    let lifecycle = Lifecycle::from_config(&config).context("opening storage")?;
    let writer = Arc::new(BackgroundAuditWriter::spawn(lifecycle.trail().clone()));
    let lifecycle = lifecycle.with_audit_sink(writer.clone());

    let result = commands::dispatch(&lifecycle, &matches);

    // Queued backups are flushed even when the command failed
    let stats = writer.shutdown().await.context("flushing audit backups")?;
    if stats.failed > 0 {
        tracing::warn!(failed = stats.failed, "some history backups were not written");
    }
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("json-logs"));

    match run(matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let matches = build_cli()
            .try_get_matches_from([
                "lifecycle",
                "history",
                "01HZX3W9Q6T8KX6V1N3C5R7PBA",
                "--data-dir",
                "/tmp/x",
            ])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("data-dir"),
            Some(&PathBuf::from("/tmp/x"))
        );
    }

    #[test]
    fn migrate_needs_id_or_all() {
        assert!(build_cli().try_get_matches_from(["lifecycle", "migrate"]).is_err());
        assert!(build_cli().try_get_matches_from(["lifecycle", "migrate", "--all"]).is_ok());
        assert!(build_cli()
            .try_get_matches_from(["lifecycle", "migrate", "--all", "--dry-run"])
            .is_err());
    }

    #[test]
    fn data_dir_overrides_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lifecycle.toml");
        std::fs::write(&path, "[storage]\ndata_dir = \"/srv/lifecycle\"\n").unwrap();
        let matches = build_cli()
            .try_get_matches_from([
                "lifecycle",
                "--config",
                path.to_str().unwrap(),
                "--data-dir",
                "/tmp/override",
                "history",
                "01HZX3W9Q6T8KX6V1N3C5R7PBA",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/override"));
    }
}
