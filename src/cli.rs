use std::io::{self, BufRead, Write};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use crate::catalog::{self, Backend, Entity, LookupFeeds, Lookups};
use crate::config::Config;
use crate::crud::{LoadParams, Page, SortDirection};
use crate::models::{Classification, Employee, FamilyMember, Person, RecordKey, Unit};
use crate::tui::components::column::{truncate, ColumnDescriptor};
use crate::tui::components::form::FormRenderer;

#[derive(Parser)]
#[command(name = "civic-registry")]
#[command(about = "Records manager for a municipal social-assistance registry")]
#[command(version)]
pub struct Cli {
    /// Defaults to the interactive TUI
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Units,
    Employees,
    Persons,
    FamilyMembers,
    Classifications,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List one page of records
    List {
        #[arg(short, long, value_enum)]
        entity: EntityKind,

        /// Page number (1-indexed)
        #[arg(short, long, default_value_t = 1)]
        page: u32,

        /// Records per page (defaults to REGISTRY_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<u32>,

        /// Search term matched against the entity's searchable fields
        #[arg(short, long)]
        search: Option<String>,

        /// Field to sort by
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Write CSV to stdout instead of a table
        #[arg(long)]
        csv: bool,
    },

    /// Show one record as JSON
    Show {
        #[arg(short, long, value_enum)]
        entity: EntityKind,

        /// Record key (household-person for family members)
        key: String,
    },

    /// Create a record from field assignments
    Create {
        #[arg(short, long, value_enum)]
        entity: EntityKind,

        /// Field assignment, repeatable
        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Change fields of an existing record
    Update {
        #[arg(short, long, value_enum)]
        entity: EntityKind,

        key: String,

        #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
        set: Vec<(String, String)>,
    },

    /// Delete a record
    Delete {
        #[arg(short, long, value_enum)]
        entity: EntityKind,

        key: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Fill an empty registry with demonstration records
    Seed,

    /// Start the interactive terminal interface
    Tui,
}

/// Parse `field=value`
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    Ok((field.to_string(), value.to_string()))
}

macro_rules! for_entity {
    ($kind:expr, $func:ident($($arg:expr),*)) => {
        match $kind {
            EntityKind::Units => $func::<Unit>($($arg),*).await,
            EntityKind::Employees => $func::<Employee>($($arg),*).await,
            EntityKind::Persons => $func::<Person>($($arg),*).await,
            EntityKind::FamilyMembers => $func::<FamilyMember>($($arg),*).await,
            EntityKind::Classifications => $func::<Classification>($($arg),*).await,
        }
    };
}

/// Run a non-interactive command
pub async fn execute(command: Commands, backend: &Backend, config: &Config) -> Result<()> {
    match command {
        Commands::List {
            entity,
            page,
            page_size,
            search,
            sort,
            desc,
            csv,
        } => {
            let mut params = LoadParams::new(page, page_size.unwrap_or(config.ui.page_size));
            if let Some(ref field) = sort {
                let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
                params = params.with_sort(field, direction);
            }
            if let Some(ref term) = search {
                params = params.with_search(term);
            }
            params.validate()?;
            for_entity!(entity, list(backend, params, csv))
        }
        Commands::Show { entity, key } => for_entity!(entity, show(backend, &key)),
        Commands::Create { entity, set } => for_entity!(entity, create(backend, &set)),
        Commands::Update { entity, key, set } => {
            for_entity!(entity, update(backend, &key, &set))
        }
        Commands::Delete { entity, key, yes } => for_entity!(entity, delete(backend, &key, yes)),
        Commands::Seed => {
            let report = catalog::seed(backend).await?;
            println!("Seeded {} records into the {}:", report.total(), backend.describe());
            println!("  classifications: {}", report.classifications);
            println!("  units:           {}", report.units);
            println!("  persons:         {}", report.persons);
            println!("  employees:       {}", report.employees);
            println!("  family members:  {}", report.family_members);
            Ok(())
        }
        Commands::Tui => bail!("the TUI is started by the binary, not through execute"),
    }
}

/// Lookups with their options loaded, so lookup columns and selects resolve
async fn loaded_lookups(backend: &Backend) -> Lookups {
    let (feeds, lookups) = LookupFeeds::new(backend);
    feeds.refresh_all().await;
    lookups
}

fn parse_key<R: Entity>(raw: &str) -> Result<R::Key> {
    R::Key::parse_key(raw).map_err(|e| anyhow!("Invalid {} key '{}': {}", R::SINGULAR, raw, e))
}

async fn list<R: Entity>(backend: &Backend, params: LoadParams, csv: bool) -> Result<()> {
    let page = backend
        .source::<R>()
        .load(&params)
        .await
        .with_context(|| format!("Failed to list {}", R::TITLE.to_lowercase()))?;
    let columns = R::columns(&loaded_lookups(backend).await);

    if csv {
        write_csv(io::stdout().lock(), &columns, &page.data)?;
        return Ok(());
    }

    if page.data.is_empty() {
        println!("No {} found", R::TITLE.to_lowercase());
        return Ok(());
    }
    print!("{}", format_table(&columns, &page)?);
    Ok(())
}

/// Plain-text table of one page, followed by the page caption
pub fn format_table<R: Entity>(columns: &[ColumnDescriptor], page: &Page<R>) -> Result<String> {
    let mut out = String::new();
    let header: Vec<String> = columns
        .iter()
        .map(|c| pad(&c.label, c.width as usize))
        .collect();
    out.push_str(header.join(" ").trim_end());
    out.push('\n');
    let rule_width: usize = columns.iter().map(|c| c.width as usize + 1).sum();
    out.push_str(&"-".repeat(rule_width.saturating_sub(1)));
    out.push('\n');

    for record in &page.data {
        let projection = serde_json::to_value(record)?;
        let cells: Vec<String> = columns
            .iter()
            .map(|c| pad(&c.cell(&projection), c.width as usize))
            .collect();
        out.push_str(cells.join(" ").trim_end());
        out.push('\n');
    }

    out.push('\n');
    out.push_str(&format!(
        "Page {} of {} ({} total)\n",
        page.page,
        page.total_pages.max(1),
        page.total
    ));
    Ok(out)
}

fn pad(text: &str, width: usize) -> String {
    let cell = truncate(text, width);
    let used = unicode_width::UnicodeWidthStr::width(cell.as_str());
    format!("{}{}", cell, " ".repeat(width.saturating_sub(used)))
}

/// CSV export with one column per descriptor, cells formatted as in the list
pub fn write_csv<W: Write, R: Entity>(
    writer: W,
    columns: &[ColumnDescriptor],
    records: &[R],
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(columns.iter().map(|c| c.label.as_str()))?;
    for record in records {
        let projection = serde_json::to_value(record)?;
        csv.write_record(columns.iter().map(|c| c.cell(&projection)))?;
    }
    csv.flush()?;
    Ok(())
}

async fn show<R: Entity>(backend: &Backend, raw_key: &str) -> Result<()> {
    let key = parse_key::<R>(raw_key)?;
    let record = backend
        .source::<R>()
        .load_one(&key)
        .await
        .with_context(|| format!("Failed to load {} {}", R::SINGULAR, key))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Run assignments through the entity form so the CLI enforces the same
/// validation as the TUI; `base` is the record being updated
pub fn form_payload<R: Entity>(
    lookups: &Lookups,
    base: Option<&Value>,
    assignments: &[(String, String)],
) -> Result<Value> {
    let mut form = FormRenderer::new(R::SINGULAR, R::fields(lookups));
    if let Some(record) = base {
        form.bind(record);
    }
    form.sync_options();

    for (field, value) in assignments {
        if !form.set_value(field, value) {
            let known: Vec<&str> = form.field_names().collect();
            bail!(
                "{} has no field '{}' (fields: {})",
                R::SINGULAR,
                field,
                known.join(", ")
            );
        }
    }

    match form.submit(Instant::now()) {
        Some(payload) => Ok(payload),
        None => {
            let details: Vec<String> = form
                .errors()
                .into_iter()
                .map(|(field, message)| format!("  {}: {}", field, message))
                .collect();
            bail!("Invalid {}:\n{}", R::SINGULAR, details.join("\n"))
        }
    }
}

async fn create<R: Entity>(backend: &Backend, assignments: &[(String, String)]) -> Result<()> {
    let lookups = loaded_lookups(backend).await;
    let payload = form_payload::<R>(&lookups, None, assignments)?;
    let record = backend
        .source::<R>()
        .create(payload)
        .await
        .with_context(|| format!("Failed to create {}", R::SINGULAR))?;
    info!(resource = R::RESOURCE, key = %record.key(), "created from CLI");
    println!("Created {} {}", R::SINGULAR, record.key());
    Ok(())
}

async fn update<R: Entity>(
    backend: &Backend,
    raw_key: &str,
    assignments: &[(String, String)],
) -> Result<()> {
    if assignments.is_empty() {
        bail!("Nothing to update; pass at least one --set FIELD=VALUE");
    }
    let key = parse_key::<R>(raw_key)?;
    let source = backend.source::<R>();
    let current = source
        .load_one(&key)
        .await
        .with_context(|| format!("Failed to load {} {}", R::SINGULAR, key))?;

    let lookups = loaded_lookups(backend).await;
    let payload = form_payload::<R>(&lookups, Some(&serde_json::to_value(&current)?), assignments)?;
    source
        .update(&key, payload)
        .await
        .with_context(|| format!("Failed to update {} {}", R::SINGULAR, key))?;
    info!(resource = R::RESOURCE, %key, "updated from CLI");
    println!("Updated {} {}", R::SINGULAR, key);
    Ok(())
}

async fn delete<R: Entity>(backend: &Backend, raw_key: &str, yes: bool) -> Result<()> {
    let key = parse_key::<R>(raw_key)?;
    if !yes && !confirm(&format!("Delete {} {}? [y/N] ", R::SINGULAR, key))? {
        println!("Cancelled");
        return Ok(());
    }
    backend
        .source::<R>()
        .delete(&key)
        .await
        .with_context(|| format!("Failed to delete {} {}", R::SINGULAR, key))?;
    info!(resource = R::RESOURCE, %key, "deleted from CLI");
    println!("Deleted {} {}", R::SINGULAR, key);
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
