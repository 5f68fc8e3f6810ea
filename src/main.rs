use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use stepform::cli::commands::{EditCommand, SchemasCommand, StepsCommand, ValidateCommand};
use stepform::cli::output::*;
use stepform::cli::{Cli, Command};
use stepform::form::Notifier;
use stepform::persistence::{InMemoryPersistence, PersistenceBackend};
use stepform::{FormError, GraphNode, JobGraph, JobId, MessageCatalog, SchemaCatalog, StepFormController, SubmitOutcome};
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[cfg(feature = "sqlite")]
use stepform::persistence::{SqliteStepStore, StepRepository};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let catalog = match &cli.catalog {
        Some(path) => SchemaCatalog::from_file(path)
            .with_context(|| format!("Failed to load schema catalog {}", path))?,
        None => SchemaCatalog::builtin()?,
    };
    let messages = match &cli.messages {
        Some(path) => MessageCatalog::from_file(path)
            .with_context(|| format!("Failed to load messages {}", path))?,
        None => MessageCatalog::builtin()?,
    };

    // Execute command
    match &cli.command {
        Command::Schemas(cmd) => show_schemas(cmd, &catalog, &messages)?,
        Command::Validate(cmd) => validate_step(cmd, &catalog, messages).await?,
        Command::Edit(cmd) => edit_step(cmd, &catalog, messages).await?,
        Command::Steps(cmd) => show_steps(cmd).await?,
    }

    Ok(())
}

fn show_schemas(cmd: &SchemasCommand, catalog: &SchemaCatalog, messages: &MessageCatalog) -> Result<()> {
    if let Some(step_type) = &cmd.step_type {
        let schema = catalog.schema_for(step_type)?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(schema)?);
        } else {
            print!("{}", format_schema(schema, messages));
        }
        return Ok(());
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(catalog)?);
        return Ok(());
    }

    println!("{} {} step types:", INFO, style(catalog.len()).cyan());
    for step_type in catalog.step_types() {
        if let Some(schema) = catalog.schema(step_type) {
            println!(
                "  {} ({} parameters, {} required)",
                style(step_type).bold(),
                style(schema.parameters.len()).cyan(),
                style(schema.required_names().len()).cyan()
            );
        }
    }
    Ok(())
}

fn load_graph(path: &str) -> Result<JobGraph> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job graph {}", path))?;
    JobGraph::from_json(&content).with_context(|| format!("Invalid job graph {}", path))
}

/// Open a form and apply command-line values to it
async fn prepare_form<B: PersistenceBackend>(
    form: &StepFormController<B>,
    set: &[(String, String)],
    clear: &[String],
) -> Result<()> {
    form.open().await?;
    for (key, value) in set {
        form.set_field_text(key, value)
            .await
            .with_context(|| format!("Cannot set {}", key))?;
    }
    for key in clear {
        form.clear_field(key)
            .await
            .with_context(|| format!("Cannot clear {}", key))?;
    }
    Ok(())
}

async fn validate_step(cmd: &ValidateCommand, catalog: &SchemaCatalog, messages: MessageCatalog) -> Result<()> {
    let graph = load_graph(&cmd.graph)?;
    let labels = Arc::new(messages);
    let form = StepFormController::from_catalog(catalog, graph, cmd.step.clone(), "local", InMemoryPersistence::new())?
        .with_labels(labels.clone());

    prepare_form(&form, &cmd.set, &[]).await?;

    println!("{} {}", INFO, style(form.title().await).bold());
    println!("{}", format_form(form.schema(), &form.values().await, labels.as_ref()));

    match form.validate().await {
        Ok(patch) => {
            println!("\n{} Step {} is valid ({} attributes)", CHECK, style(&cmd.step).cyan(), patch.len());
            Ok(())
        }
        Err(FormError::Validation(_)) => {
            println!("\n{} Step {} has invalid fields:", CROSS, style(&cmd.step).red());
            println!(
                "{}",
                format_field_errors(&form.field_errors().await, labels.as_ref(), form.schema())
            );
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

async fn edit_step(cmd: &EditCommand, catalog: &SchemaCatalog, messages: MessageCatalog) -> Result<()> {
    if cmd.in_memory {
        return run_edit(cmd, catalog, messages, InMemoryPersistence::new()).await;
    }

    #[cfg(feature = "sqlite")]
    {
        let store = match &cmd.db {
            Some(path) => SqliteStepStore::new(path).await?,
            None => SqliteStepStore::with_default_path().await?,
        };
        run_edit(cmd, catalog, messages, store).await
    }

    #[cfg(not(feature = "sqlite"))]
    {
        println!("{} Built without SQLite support; saving in memory", WARN);
        run_edit(cmd, catalog, messages, InMemoryPersistence::new()).await
    }
}

async fn run_edit<B: PersistenceBackend>(
    cmd: &EditCommand,
    catalog: &SchemaCatalog,
    messages: MessageCatalog,
    backend: B,
) -> Result<()> {
    let graph = load_graph(&cmd.graph)?;
    let labels = Arc::new(messages);
    let notifier = Arc::new(TerminalNotifier);
    let updated: Arc<Mutex<Option<GraphNode>>> = Arc::new(Mutex::new(None));
    let completed = updated.clone();

    let form = StepFormController::from_catalog(catalog, graph, cmd.step.clone(), JobId::from(cmd.job_id.as_str()), backend)?
        .with_labels(labels.clone())
        .with_notifier(notifier.clone())
        .with_event_handler(|event| tracing::debug!("{}", format_form_event(&event)))
        .on_complete(move |node| {
            if let Ok(mut slot) = completed.lock() {
                *slot = Some(node.clone());
            }
        });

    prepare_form(&form, &cmd.set, &cmd.clear).await?;

    println!("{} {}", INFO, style(form.title().await).bold());
    println!("{}", format_form(form.schema(), &form.values().await, labels.as_ref()));
    for (field, _) in form.schema().dictionary_fields() {
        if let Some(state) = form.options(field).await {
            println!("  {} options: {}", style(field).dim(), format_options_state(&state));
        }
    }
    println!("{}", style(separator()).dim());

    let spinner = create_spinner("Saving step...");
    let result = form.submit().await;
    spinner.finish_and_clear();

    match result {
        Ok(SubmitOutcome::Saved(patch)) => {
            println!(
                "{} {} saved with {} attributes",
                CHECK,
                style(patch.step_title()).bold(),
                style(patch.len()).cyan()
            );

            if cmd.write_back {
                let graph = form.graph().await;
                let json = serde_json::to_string_pretty(&graph)?;
                std::fs::write(&cmd.graph, json)
                    .with_context(|| format!("Failed to write job graph {}", cmd.graph))?;
                println!("{} Updated {}", INFO, style(&cmd.graph).dim());
            }

            let node = updated.lock().ok().and_then(|slot| slot.clone());
            if let Some(node) = node {
                println!("  {}", style(node.attrs_json()).dim());
            }
            Ok(())
        }
        Ok(SubmitOutcome::Ignored) => {
            println!("{} A save is already in progress", WARN);
            Ok(())
        }
        Err(FormError::Validation(_)) => {
            println!("{} Step {} has invalid fields:", CROSS, style(&cmd.step).red());
            println!(
                "{}",
                format_field_errors(&form.field_errors().await, labels.as_ref(), form.schema())
            );
            std::process::exit(1);
        }
        Err(FormError::Persistence(e)) => {
            notifier.error(&e.to_string());
            error!("Save of step {} failed; nothing was changed", cmd.step);
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "sqlite")]
async fn show_steps(cmd: &StepsCommand) -> Result<()> {
    let store = match &cmd.db {
        Some(path) => SqliteStepStore::new(path).await?,
        None => SqliteStepStore::with_default_path().await?,
    };
    let job_id = JobId::from(cmd.job_id.as_str());

    let steps = match &cmd.step {
        Some(step) => store.load_step(&job_id, step).await?.into_iter().collect(),
        None => store.list_steps(&job_id).await?,
    };

    if steps.is_empty() {
        println!("{} No steps saved for job {}", INFO, style(&job_id).cyan());
        return Ok(());
    }

    if cmd.json {
        let data = serde_json::json!({ "jobId": job_id, "steps": steps });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Steps of job {}:", INFO, style(&job_id).cyan());
        for step in &steps {
            println!("  {}", format_stored_step(step));
        }
    }

    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn show_steps(_cmd: &StepsCommand) -> Result<()> {
    anyhow::bail!("Saved steps are only available with the sqlite feature")
}
