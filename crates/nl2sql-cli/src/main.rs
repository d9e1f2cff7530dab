use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nl2sql_core::{Config, Diagnostic, IntentSource, Severity};
use nl2sql_ddl::DdlParser;
use nl2sql_engine::{
    build_prompt, build_semantic_context, build_training_example, AskOutcome, Assistant, IngestReport, Ingestor,
    QueryOutcome, RankedTable, SemanticRetriever,
};
use nl2sql_model::{
    embedder_from_config, ChatCompleter, CompletionIntentGenerator, HttpModelClient, IntentGenerator,
};
use nl2sql_store::{MetadataStore, QueryRows};

const DEFAULT_CONFIG: &str = "nl2sql.toml";

/// nl2sql - ask questions about uploaded SQLite databases in plain language
#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: nl2sql.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the metadata store
    Init {
        /// Drop every stored row first
        #[arg(long)]
        reset: bool,

        /// Also write a default nl2sql.toml if none exists
        #[arg(long)]
        write_config: bool,
    },

    /// Parse DDL files, generate intents and store the metadata
    Ingest {
        /// DDL files (.sql), paired in order with --db
        #[arg(long = "ddl", required = true)]
        ddl: Vec<PathBuf>,

        /// SQLite database files (.db), paired in order with --ddl
        #[arg(long = "db", required = true)]
        db: Vec<PathBuf>,

        /// Keep rows from earlier ingestions of the same database
        #[arg(long)]
        append: bool,
    },

    /// List ingested databases
    Databases,

    /// List stored tables and their intents
    Tables {
        /// Only this database
        db: Option<String>,
    },

    /// Show the prompt that would be sent for a question
    Prompt {
        question: String,

        /// Only rank tables of this database
        #[arg(long)]
        db: Option<String>,

        /// Number of tables to include
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Known SQL answer; prints a completion-labelled example instead
        #[arg(long)]
        answer: Option<String>,
    },

    /// Generate SQL for a question and run it
    Ask {
        question: String,

        /// Only rank tables of this database
        #[arg(long)]
        db: Option<String>,

        /// Number of tables to include
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // .env may hold MODEL_SERVER_URL and API keys
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("{} {}", "⚠ Failed to load .env:".yellow(), e);
        }
    }

    let mut config = load_config(cli.config.as_deref(), cli.verbose)?;
    config.apply_env();

    if cli.verbose {
        eprintln!("{} {}", "Metadata store:".cyan(), config.store_path().display());
        eprintln!("{} {}", "Uploads directory:".cyan(), config.uploads_dir().display());
    }

    match cli.command {
        Commands::Init { reset, write_config } => init_command(&config, reset, write_config, cli.config.as_deref()),
        Commands::Ingest { ddl, db, append } => ingest_command(&config, &ddl, &db, append, cli.verbose).await,
        Commands::Databases => databases_command(&config),
        Commands::Tables { db } => tables_command(&config, db.as_deref()),
        Commands::Prompt { question, db, top_k, answer } => {
            prompt_command(&config, &question, db.as_deref(), top_k, answer.as_deref()).await
        }
        Commands::Ask { question, db, top_k } => {
            ask_command(&config, &question, db.as_deref(), top_k, cli.verbose).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config_path = match path {
        Some(config_path) => Some(config_path),
        None => Some(Path::new(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };
    if let Some(config_path) = config_path {
        debug!(path = %config_path.display(), "loading config");
        return Ok(Config::from_file(config_path)?);
    }
    if verbose {
        eprintln!("{}", "No config file found, using defaults".yellow());
    }
    Ok(Config::default())
}

/// Open the store, failing with a hint when `init` has not run
///
/// A missing store file is reported without creating it.
fn open_store(config: &Config) -> Result<MetadataStore> {
    let path = config.store_path();
    let not_initialized = || {
        anyhow::anyhow!(
            "Metadata store at {} is not initialized. Run 'nl2sql init' or 'nl2sql ingest' first.",
            path.display()
        )
    };

    if !path.is_file() {
        return Err(not_initialized());
    }
    let store = MetadataStore::open(&path)?;
    if !store.is_initialized()? {
        return Err(not_initialized());
    }
    Ok(store)
}

fn intent_generator(config: &Config) -> Result<Arc<dyn IntentGenerator>> {
    match config.model.intent_source {
        IntentSource::Service => {
            config.require_server_url()?;
            Ok(Arc::new(HttpModelClient::from_config(&config.model)?))
        }
        IntentSource::Completion => {
            let completer = ChatCompleter::from_config(&config.model)?;
            Ok(Arc::new(CompletionIntentGenerator::new(Arc::new(completer))))
        }
    }
}

fn assistant(config: &Config, store: MetadataStore, top_k: Option<usize>) -> Result<Assistant> {
    let embedder = embedder_from_config(&config.embedding)?;
    let generator = Arc::new(HttpModelClient::from_config(&config.model)?);

    Ok(Assistant::new(Arc::new(store), embedder, generator, config.uploads_dir())
        .with_top_k(top_k.unwrap_or(config.retrieval.top_k)))
}

/// Init command - create or reset the metadata store
fn init_command(config: &Config, reset: bool, write_config: bool, config_path: Option<&Path>) -> Result<()> {
    let store = MetadataStore::open(config.store_path())?;

    if reset {
        store.reset()?;
        println!("{} {}", "✓ Metadata store reset:".green(), config.store_path().display());
    } else {
        store.initialize()?;
        println!("{} {}", "✓ Metadata store ready:".green(), config.store_path().display());
    }

    if write_config {
        let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG));
        if path.exists() {
            println!("{} {}", "Config already exists:".yellow(), path.display());
        } else {
            Config::default().save_to_file(path)?;
            println!("{} {}", "✓ Wrote config:".green(), path.display());
        }
    }

    Ok(())
}

/// Ingest command - DDL + database pairs into the metadata store
async fn ingest_command(config: &Config, ddl: &[PathBuf], db: &[PathBuf], append: bool, verbose: bool) -> Result<()> {
    if ddl.len() != db.len() {
        eprintln!(
            "{} {} DDL files and {} database files; only the first {} pairs are ingested",
            "⚠ Warning:".yellow(),
            ddl.len(),
            db.len(),
            ddl.len().min(db.len())
        );
    }

    let store = MetadataStore::open(config.store_path())?;
    store.initialize()?;

    let parser = DdlParser::from_dialect(&config.dialect);
    let ingestor = Ingestor::new(parser, intent_generator(config)?, config.uploads_dir()).with_append(append);

    let mut reports = Vec::new();
    for (ddl_path, db_path) in ddl.iter().zip(db) {
        println!("{} {} + {}", "Processing:".cyan(), ddl_path.display(), db_path.display());

        let report = ingestor.ingest(&store, ddl_path, db_path).await?;

        if verbose {
            print_diagnostics(&report.diagnostics);
        }
        if report.is_empty() {
            println!("  {} No tables found in {}", "⚠".yellow(), ddl_path.display());
            continue;
        }
        if report.replaced_rows > 0 {
            println!("  Replaced {} rows from an earlier ingestion", report.replaced_rows);
        }
        reports.push(report);
    }

    for report in &reports {
        print_ingest_summary(report);
    }

    Ok(())
}

/// Databases command - list ingested database ids
fn databases_command(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let databases = store.list_databases()?;

    if databases.is_empty() {
        println!("{}", "No databases ingested yet".yellow());
        return Ok(());
    }

    for db_id in databases {
        let on_disk = config.store.database_path(&db_id);
        let marker = if config.resolve(&on_disk).exists() { "✓".green() } else { "✗ missing file".red() };
        println!("{} {}", db_id.bold(), marker);
    }

    Ok(())
}

/// Tables command - list stored tables with their intents
fn tables_command(config: &Config, db: Option<&str>) -> Result<()> {
    let store = open_store(config)?;

    let databases: Vec<String> = match db {
        Some(db_id) => vec![db_id.to_string()],
        None => store.list_databases()?.into_iter().collect(),
    };

    for db_id in databases {
        println!("{}", db_id.bold().bright_blue());
        let tables = store.list_tables(&db_id)?;
        if tables.is_empty() {
            println!("  {}", "(no tables)".yellow());
        }
        for table in tables {
            let intent = store.table_intent(&db_id, &table)?;
            println!("  {} - {}", table.bold(), intent);
        }
    }

    Ok(())
}

/// Prompt command - show the assembled prompt
async fn prompt_command(
    config: &Config,
    question: &str,
    db: Option<&str>,
    top_k: Option<usize>,
    answer: Option<&str>,
) -> Result<()> {
    let store = open_store(config)?;
    let retriever = SemanticRetriever::new(embedder_from_config(&config.embedding)?);
    let top_k = top_k.unwrap_or(config.retrieval.top_k);

    let ranked = retriever.rank(&store, question, top_k, db).await?;
    for table in &ranked {
        eprintln!("{} {}.{} ({:.3})", "Ranked:".cyan(), table.db_id, table.table_name, table.score);
    }

    let keys: Vec<(String, String)> = ranked.iter().map(RankedTable::key).collect();
    let Some(context) = build_semantic_context(&store, &keys)? else {
        println!("{}", "No relevant tables found. Ingest a database with table intents first.".yellow());
        return Ok(());
    };

    match answer {
        Some(sql) => println!("{}", build_training_example(question, &context.db_id, &context.tables, sql)),
        None => println!("{}", build_prompt(question, &context.db_id, &context.tables, true)),
    }

    Ok(())
}

/// Ask command - generate SQL and run it against the chosen database
async fn ask_command(config: &Config, question: &str, db: Option<&str>, top_k: Option<usize>, verbose: bool) -> Result<()> {
    config.require_server_url()?;
    let assistant = assistant(config, open_store(config)?, top_k)?;

    let answer = match assistant.ask(question, db).await? {
        AskOutcome::NoRelevantTables => {
            println!("{}", "No relevant tables found. Ingest a database with table intents first.".yellow());
            return Ok(());
        }
        AskOutcome::Answered(answer) => answer,
    };

    if verbose {
        eprintln!("{}", "Generated prompt:".cyan());
        eprintln!("{}", answer.prepared.prompt);
        eprintln!();
    }

    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Question:".bold(), question);
    println!(
        "{} {} ({})",
        "Database:".bold(),
        answer.prepared.context.db_id,
        answer.prepared.context.table_names().join(", ")
    );
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("{}", "Generated SQL:".bold());
    println!("{}", answer.sql.cyan());
    println!();

    println!("{}", "Result:".bold());
    match &answer.outcome {
        QueryOutcome::Rows(rows) => print_rows(rows),
        QueryOutcome::Failed(message) => println!("{}", format!("❌ {}", message).red()),
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());

    Ok(())
}

fn print_ingest_summary(report: &IngestReport) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{} {}", "Extracted Metadata + Intents:".bold().bright_blue(), report.db_id);
    println!("{}", "=".repeat(60).bright_blue());

    for table in report.tables() {
        println!();
        println!("{} {} - {}", "Table:".bold(), table.table_name.bold(), table.table_intent);
        for column in table.columns {
            let intent = if column.column_intent.is_empty() {
                "(no intent)".dimmed().to_string()
            } else {
                column.column_intent.clone()
            };
            println!("  - {} ({}): {}", column.column_name, column.data_type, intent);
        }
    }

    println!();
    println!(
        "{} {} rows from {} tables",
        "✓ Stored".green(),
        report.records.len(),
        report.tables().len()
    );
}

fn print_rows(rows: &QueryRows) {
    if rows.is_empty() {
        println!("{}", "(no rows)".yellow());
        return;
    }

    println!("{}", rows.columns.join(" | ").bold());
    for row in &rows.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => "NULL".to_string(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }
    println!("{}", format!("{} rows", rows.len()).dimmed());
}

fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        let severity_str = match diag.severity {
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };

        eprintln!("  [{}] {}: {}", severity_str, diag.code, diag.message);
        if let Some(loc) = &diag.location {
            eprintln!("    at {}", loc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    fn config_in(root: &Path) -> Config {
        let mut config = Config::default();
        config.project_root = root.to_path_buf();
        config.store.path = PathBuf::from("state/metadata_store.db");
        config
    }

    #[test]
    fn read_commands_do_not_create_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = open_store(&config).err().unwrap();
        assert!(err.to_string().contains("not initialized"));
        assert!(!config.store_path().exists());
        assert!(!dir.path().join("state").exists());
    }

    #[test]
    fn initialized_store_opens() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        init_command(&config, false, false, None).unwrap();

        let store = open_store(&config).unwrap();
        assert_eq!(store.row_count().unwrap(), 0);
    }

    #[test]
    fn parse_ingest_pairs() {
        let cli = Cli::parse_from([
            "nl2sql", "ingest", "--ddl", "hr.sql", "--db", "hr.db", "--ddl", "shop.sql", "--db", "shop.db", "--append",
        ]);
        match cli.command {
            Commands::Ingest { ddl, db, append } => {
                assert_eq!(ddl, vec![PathBuf::from("hr.sql"), PathBuf::from("shop.sql")]);
                assert_eq!(db, vec![PathBuf::from("hr.db"), PathBuf::from("shop.db")]);
                assert!(append);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn parse_ask_options() {
        let cli = Cli::parse_from(["nl2sql", "-v", "ask", "how many employees?", "--db", "hr.db", "-k", "2"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask { question, db, top_k } => {
                assert_eq!(question, "how many employees?");
                assert_eq!(db.as_deref(), Some("hr.db"));
                assert_eq!(top_k, Some(2));
            }
            _ => panic!("expected ask"),
        }
    }
}
