//! Serene CLI: command-line interface for the Serene data integration service
//!
//! Uses the serene client over HTTP to talk to a running server.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use serde_json::{json, Value};
use serene::{ClientConfig, Entity, EntityKind, PollEvent, Serene};

#[derive(Parser)]
#[command(name = "serene", version, about = "Serene data integration CLI")]
struct Cli {
    /// YAML client configuration (defaults come from SERENE_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Server host
    #[arg(long, global = true, env = "SERENE_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(long, global = true, env = "SERENE_PORT")]
    port: Option<u16>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Kind {
    Datasets,
    Ontologies,
    Ssds,
    Models,
    Octopii,
}

impl Kind {
    fn entity_kind(self) -> EntityKind {
        match self {
            Kind::Datasets => EntityKind::DataSet,
            Kind::Ontologies => EntityKind::Ontology,
            Kind::Ssds => EntityKind::Ssd,
            Kind::Models => EntityKind::Model,
            Kind::Octopii => EntityKind::Octopus,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List stored entities of one kind
    List { kind: Kind },
    /// Print the raw server blob of one entity
    Show { kind: Kind, id: i64 },
    /// Upload a CSV dataset
    Upload {
        path: PathBuf,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove one entity
    Remove { kind: Kind, id: i64 },
    /// Train an octopus and wait for the outcome
    Train { octopus: i64 },
    /// Summarise the alignment graph of a trained octopus
    Alignment { octopus: i64 },
    /// Mine patterns of a trained octopus and write them as CSV
    Patterns {
        octopus: i64,
        #[arg(long, default_value = "patterns.csv")]
        out: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_yaml_file(path)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let serene = Serene::new(load_config(&cli)?)?;

    match cli.command {
        Commands::List { kind } => run_list(&serene, kind, &cli.format),
        Commands::Show { kind, id } => {
            let blob = serene.transport().item(kind.entity_kind(), id)?;
            println!("{}", serde_json::to_string_pretty(&blob)?);
            Ok(())
        }
        Commands::Upload { path, description } => {
            let dataset = serene
                .datasets()
                .upload(&path, &description, &Default::default())
                .with_context(|| format!("uploading {}", path.display()))?;
            println!("{}", dataset);
            Ok(())
        }
        Commands::Remove { kind, id } => {
            match kind {
                Kind::Datasets => serene.datasets().remove(id)?,
                Kind::Ontologies => serene.ontologies().remove(id)?,
                Kind::Ssds => serene.ssds().remove(id)?,
                Kind::Models => serene.models().remove(id)?,
                Kind::Octopii => serene.octopii().remove(id)?,
            }
            println!("Removed {} {}", kind.entity_kind(), id);
            Ok(())
        }
        Commands::Train { octopus } => run_train(&serene, octopus),
        Commands::Alignment { octopus } => run_alignment(&serene, octopus, &cli.format),
        Commands::Patterns { octopus, out } => {
            let octopus = serene.octopii().get(octopus)?;
            let rows = serene.octopii().patterns(&octopus, &out)?;
            println!("{} pattern(s) written to {}", rows.len(), out.display());
            Ok(())
        }
    }
}

fn date(entity: &impl Entity) -> Value {
    entity
        .date_modified()
        .map(|d| json!(d.to_rfc3339()))
        .unwrap_or(Value::Null)
}

/// One row per entity: id, name, detail, modified
fn list_rows(serene: &Serene, kind: Kind) -> Result<Vec<Vec<Value>>> {
    let rows = match kind {
        Kind::Datasets => serene
            .datasets()
            .items()?
            .iter()
            .map(|d| vec![json!(d.id()), json!(d.filename()), json!(format!("{} columns", d.columns().len())), date(&**d)])
            .collect(),
        Kind::Ontologies => serene
            .ontologies()
            .items()?
            .iter()
            .map(|o| vec![json!(o.id()), json!(o.name()), json!(o.format().as_str()), date(&**o)])
            .collect(),
        Kind::Ssds => serene
            .ssds()
            .items()?
            .iter()
            .map(|s| vec![json!(s.id()), json!(s.name()), json!(format!("{} mappings", s.mappings().len())), date(&**s)])
            .collect(),
        Kind::Models => serene
            .models()
            .items()?
            .iter()
            .map(|m| {
                let status = m.state().map(|s| s.status.to_string()).unwrap_or_default();
                vec![json!(m.id()), json!(m.description()), json!(status), date(&**m)]
            })
            .collect(),
        Kind::Octopii => serene
            .octopii()
            .items()?
            .iter()
            .map(|o| {
                let status = o.state().map(|s| s.status.to_string()).unwrap_or_default();
                vec![json!(o.id()), json!(o.name()), json!(status), date(&**o)]
            })
            .collect(),
    };
    Ok(rows)
}

fn run_list(serene: &Serene, kind: Kind, format: &OutputFormat) -> Result<()> {
    let header = ["id", "name", "detail", "modified"];
    let rows = list_rows(serene, kind)?;
    print_rows(&header, &rows, format)
}

fn print_rows(header: &[&str], rows: &[Vec<Value>], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let objects: Vec<Value> = rows
                .iter()
                .map(|row| {
                    let fields = header.iter().zip(row).map(|(k, v)| (k.to_string(), v.clone()));
                    Value::Object(fields.collect())
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&objects)?);
        }
        OutputFormat::Csv => {
            println!("{}", header.join(","));
            for row in rows {
                let cells: Vec<String> = row.iter().map(format_csv_value).collect();
                println!("{}", cells.join(","));
            }
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(header);

            for row in rows {
                let cells: Vec<String> = row.iter().map(format_table_value).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s)", rows.len());
        }
    }
    Ok(())
}

fn run_train(serene: &Serene, key: i64) -> Result<()> {
    let mut octopus = serene.octopii().get(key)?.as_ref().clone();
    let poll = serene.config().poll.clone();

    let trained = serene.octopii().train(&mut octopus, &poll, |event| match event {
        PollEvent::Waiting { attempt, status, next_delay } => {
            eprintln!("  [{}] {} (next check in {:?})", attempt, status, next_delay)
        }
        PollEvent::Finished { attempts, status } => {
            eprintln!("  finished after {} check(s): {}", attempts, status)
        }
    })?;

    if trained {
        println!("{} trained", octopus);
        Ok(())
    } else {
        let message = octopus.state().map(|s| s.message.clone()).unwrap_or_default();
        anyhow::bail!("training of {} failed: {}", octopus, message)
    }
}

fn run_alignment(serene: &Serene, key: i64, format: &OutputFormat) -> Result<()> {
    let octopus = serene.octopii().get(key)?;
    let alignment = serene.octopii().alignment(&octopus)?;

    match format {
        OutputFormat::Json => {
            let summary = json!({
                "octopus": key,
                "nodes": alignment.node_count(),
                "links": alignment.edge_count(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            println!("Octopus: {}", octopus);
            println!("Nodes:   {}", alignment.node_count());
            println!("Links:   {}", alignment.edge_count());
        }
    }
    Ok(())
}

fn format_table_value(v: &Value) -> String {
    match v {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(v).unwrap_or_default(),
    }
}

fn format_csv_value(v: &Value) -> String {
    match v {
        Value::Null => "".to_string(),
        Value::String(s) => {
            if s.contains(',') || s.contains('"') || s.contains('\n') {
                format!("\"{}\"", s.replace('"', "\"\""))
            } else {
                s.clone()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            let json = serde_json::to_string(v).unwrap_or_default();
            format!("\"{}\"", json.replace('"', "\"\""))
        }
    }
}
