use anyhow::Context;
use colored::Colorize;
use harbour_meta::ObjectService;
use harbour_server::{open_service, HarbourConfig, HarbourServer};
use harbour_types::ObjectRecord;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = HarbourConfig::resolve(cli.config.as_deref()).context("loading configuration")?;
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::User(args) => with_service(&config, |svc| cmd_user(svc, args.action, format)),
        Command::Project(args) => {
            with_service(&config, |svc| cmd_project(svc, args.action, format))
        }
        Command::Objects(args) => with_service(&config, |svc| cmd_objects(svc, args, format)),
        Command::Config => cmd_config(&config, format),
    }
}

/// Open the configured metadata store, run `f`, and close the store even
/// when `f` fails.
fn with_service<F>(config: &HarbourConfig, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&ObjectService) -> anyhow::Result<()>,
{
    let service = open_service(config).context("opening metadata store")?;
    let result = f(&service);
    service.close().context("closing metadata store")?;
    result
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_serve(mut config: HarbourConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    println!(
        "{} Harbour on {} ({} metadata, content in {})",
        "✓".green().bold(),
        config.listen.to_string().bold(),
        config.meta.name().cyan(),
        config.content.path.display()
    );
    let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
    runtime.block_on(HarbourServer::new(config).serve())?;
    Ok(())
}

fn cmd_user(svc: &ObjectService, action: UserAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        UserAction::Add { name, password } => {
            svc.add_user(&name, &password)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "added": name }))?,
                OutputFormat::Text => println!("{} Added user {}", "✓".green(), name.bold()),
            }
        }
        UserAction::Delete { name } => {
            svc.delete_user(&name)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "deleted": name }))?,
                OutputFormat::Text => println!("Deleted user {}", name.bold()),
            }
        }
        UserAction::List => {
            let users = svc.list_users()?;
            match format {
                OutputFormat::Json => print_json(&users)?,
                OutputFormat::Text if users.is_empty() => println!("No users."),
                OutputFormat::Text => users.iter().for_each(|u| println!("  {u}")),
            }
        }
    }
    Ok(())
}

fn cmd_project(
    svc: &ObjectService,
    action: ProjectAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        ProjectAction::Add { name } => {
            svc.add_project(&name)?;
            match format {
                OutputFormat::Json => print_json(&json!({ "created": name }))?,
                OutputFormat::Text => println!("{} Created project {}", "✓".green(), name.yellow()),
            }
        }
        ProjectAction::List => {
            let projects = svc.list_projects()?;
            match format {
                OutputFormat::Json => print_json(&projects)?,
                OutputFormat::Text if projects.is_empty() => println!("No projects."),
                OutputFormat::Text => {
                    for p in &projects {
                        println!("  {} ({} objects)", p.name.yellow(), p.oids.len());
                    }
                }
            }
        }
    }
    Ok(())
}

/// Keep records whose hex oid contains `oid` (case-insensitive) and which
/// `project` references.
pub(crate) fn filter_objects(
    mut records: Vec<ObjectRecord>,
    oid: Option<&str>,
    project: Option<&str>,
) -> Vec<ObjectRecord> {
    if let Some(needle) = oid.filter(|n| !n.is_empty()) {
        let needle = needle.to_ascii_lowercase();
        records.retain(|r| r.oid.to_hex().contains(&needle));
    }
    if let Some(project) = project {
        records.retain(|r| r.projects.contains(project));
    }
    records
}

fn cmd_objects(svc: &ObjectService, args: ObjectsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let records = filter_objects(
        svc.list_objects()?,
        args.oid.as_deref(),
        args.project.as_deref(),
    );
    match format {
        OutputFormat::Json => print_json(&records)?,
        OutputFormat::Text if records.is_empty() => println!("No objects."),
        OutputFormat::Text => {
            for r in &records {
                let state = if r.is_committed() {
                    r.state.as_str().green()
                } else {
                    r.state.as_str().yellow()
                };
                let projects: Vec<&str> = r.projects.iter().map(String::as_str).collect();
                println!(
                    "{}  {:>12}  {:<9}  {}",
                    r.oid.short_hex().cyan(),
                    r.size,
                    state,
                    projects.join(",").dimmed()
                );
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &HarbourConfig, format: OutputFormat) -> anyhow::Result<()> {
    let redacted = config.redacted();
    match format {
        OutputFormat::Json => print_json(&redacted)?,
        OutputFormat::Text => print!("{}", redacted.to_toml_string()?),
    }
    Ok(())
}
