//! Subcommand handlers
//!
//! Handlers print to stdout; logs go to stderr. A rejected transition or
//! status change exits with code 2 so scripts can tell it from a failure.

use anyhow::{bail, Context};
use clap::ArgMatches;
use lifecycle_core::{HistorySource, Lifecycle, LoadedEntity, TransitionOutcome};
use lifecycle_migration::MigrationResult;
use lifecycle_model::{EntityId, Phase, WorkflowEntity};
use std::path::PathBuf;
use std::process::ExitCode;

const REJECTED: u8 = 2;

pub(crate) fn dispatch(lifecycle: &Lifecycle, matches: &ArgMatches) -> anyhow::Result<ExitCode> {
    match matches.subcommand() {
        Some(("create", args)) => create(lifecycle, args),
        Some(("show", args)) => show(lifecycle, args),
        Some(("migrate", args)) => migrate(lifecycle, args),
        Some(("check", args)) => check(lifecycle, args),
        Some(("transition", args)) => transition(lifecycle, args),
        Some(("status", args)) => status(lifecycle, args),
        Some(("history", args)) => history(lifecycle, args),
        Some(("progress", args)) => progress(lifecycle, args),
        Some((other, _)) => bail!("unknown command '{other}'"),
        None => bail!("no command given"),
    }
}

fn arg<'a>(args: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}>"))
}

fn entity_id(args: &ArgMatches) -> anyhow::Result<EntityId> {
    Ok(arg(args, "id")?.parse()?)
}

fn from_label(from: Option<Phase>) -> &'static str {
    from.map_or("-", Phase::as_str)
}

fn phase(name: &str) -> anyhow::Result<Phase> {
    Ok(name.parse()?)
}

/// Load an entity, saving it back when migration or repair changed it
fn load_for_update(lifecycle: &Lifecycle, id: EntityId) -> anyhow::Result<WorkflowEntity> {
    let loaded = lifecycle.load(id)?;
    report_repair(&loaded);
    if loaded.needs_save {
        lifecycle.save(&loaded.entity)?;
    }
    Ok(loaded.entity)
}

fn report_repair(loaded: &LoadedEntity) {
    if loaded.migration.migrated {
        println!(
            "migrated v{} → v{}",
            loaded.migration.original_version, loaded.migration.new_version
        );
    }
    match loaded.history_source {
        HistorySource::Document => {}
        HistorySource::AuditBackup => println!("history restored from audit backup"),
        HistorySource::Synthesized => println!("history reconstructed: no usable backup"),
    }
}

fn create(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let actor = arg(args, "actor")?;
    let mut entity = lifecycle.create(actor)?;
    if let Some(path) = args.get_one::<PathBuf>("payload") {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading payload {}", path.display()))?;
        entity.payload = serde_json::from_str(&text)
            .with_context(|| format!("parsing payload {}", path.display()))?;
        lifecycle.save(&entity)?;
    }
    println!("{}", entity.id);
    Ok(ExitCode::SUCCESS)
}

fn show(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let loaded = lifecycle.load(entity_id(args)?)?;
    let entity = &loaded.entity;
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&entity.to_document()?)?);
        return Ok(ExitCode::SUCCESS);
    }
    report_repair(&loaded);
    println!("id:       {}", entity.id);
    println!("schema:   v{}", entity.schema_version);
    println!("phase:    {}", entity.phase);
    println!("status:   {}", entity.status);
    println!("progress: {}%", lifecycle.progress(entity, None));
    println!("history:  {} record(s)", entity.history.len());
    if let Some(next) = entity.phase.next() {
        let check = lifecycle.check_transition(entity, next);
        match check.reason() {
            None => println!("next:     {next} (ready)"),
            Some(reason) => println!("next:     {next} (blocked: {reason})"),
        }
    }
    if loaded.needs_save {
        println!("note: stored document is out of date; run `lifecycle migrate {}`", entity.id);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_migration(result: &MigrationResult) {
    for step in &result.steps_applied {
        println!("applied {step}");
    }
    for change in &result.changes {
        println!("  {change}");
    }
    for error in &result.errors {
        println!("error: {error}");
    }
}

fn migrate(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    if args.get_flag("all") {
        let report = lifecycle.migrate_all()?;
        println!(
            "processed {}, migrated {}, failed {}",
            report.processed,
            report.migrated,
            report.failed.len()
        );
        for (id, reason) in &report.failed {
            println!("  {id}: {reason}");
        }
        if report.migrated > 0 {
            println!("\n{}", lifecycle.engine().report(report.migrated));
        }
        return Ok(if report.failed.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let id = entity_id(args)?;
    let raw = lifecycle
        .store()
        .load(id)?
        .with_context(|| format!("entity {id} not found"))?;
    println!("{}", lifecycle.engine().summary(&raw));
    let result = lifecycle.migrate(&raw);
    print_migration(&result);
    if !result.is_complete() {
        return Ok(ExitCode::FAILURE);
    }
    for issue in lifecycle.engine().validate_migration(&result.document) {
        println!("warning: {issue}");
    }
    if result.migrated && !args.get_flag("dry-run") {
        lifecycle.store().save(id, &result.document)?;
        println!("saved v{}", result.new_version);
    }
    Ok(ExitCode::SUCCESS)
}

fn check(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let loaded = lifecycle.load(entity_id(args)?)?;
    let target = phase(arg(args, "phase")?)?;
    let check = lifecycle.check_transition(&loaded.entity, target);
    println!("progress: {}%", check.progress);
    match check.reason() {
        None => {
            println!("{} → {target}: allowed", loaded.entity.phase);
            Ok(ExitCode::SUCCESS)
        }
        Some(reason) => {
            println!("{} → {target}: {reason}", loaded.entity.phase);
            Ok(ExitCode::from(REJECTED))
        }
    }
}

fn transition(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let mut entity = load_for_update(lifecycle, entity_id(args)?)?;
    let target = arg(args, "phase")?;
    let actor = arg(args, "actor")?;
    let notes = args.get_one::<String>("notes").map(String::as_str);

    match lifecycle
        .machine()
        .transition_named(&mut entity, target, actor, notes)
    {
        TransitionOutcome::Applied(record) => {
            lifecycle.save(&entity)?;
            println!(
                "{} → {} ({})",
                from_label(record.from_phase),
                record.to_phase,
                entity.status
            );
            Ok(ExitCode::SUCCESS)
        }
        TransitionOutcome::Rejected(rejection) => {
            println!("rejected: {rejection}");
            Ok(ExitCode::from(REJECTED))
        }
    }
}

fn status(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let mut entity = load_for_update(lifecycle, entity_id(args)?)?;
    match lifecycle
        .machine()
        .update_status_named(&mut entity, arg(args, "status")?)
    {
        Ok(()) => {
            lifecycle.save(&entity)?;
            println!("{}: {}", entity.phase, entity.status);
            Ok(ExitCode::SUCCESS)
        }
        Err(rejection) => {
            println!("rejected: {rejection}");
            Ok(ExitCode::from(REJECTED))
        }
    }
}

fn history(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let loaded = lifecycle.load(entity_id(args)?)?;
    report_repair(&loaded);
    for record in lifecycle.machine().get_history(&loaded.entity) {
        print!(
            "{}  {} → {}  by {}",
            record.timestamp.to_rfc3339(),
            from_label(record.from_phase),
            record.to_phase,
            record.actor
        );
        match &record.notes {
            Some(notes) => println!("  ({notes})"),
            None => println!(),
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn progress(lifecycle: &Lifecycle, args: &ArgMatches) -> anyhow::Result<ExitCode> {
    let loaded = lifecycle.load(entity_id(args)?)?;
    let entity = &loaded.entity;
    let phases = match args.get_one::<String>("phase") {
        Some(name) => vec![phase(name)?],
        None => Phase::ORDER.to_vec(),
    };
    for p in phases {
        let marker = if p == entity.phase { "*" } else { " " };
        println!("{marker} {:<20} {:>3}%", p.as_str(), lifecycle.progress(entity, Some(p)));
    }
    Ok(ExitCode::SUCCESS)
}
