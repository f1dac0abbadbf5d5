//! StudioDB - CLI Client

use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use studiodb::catalog::TableDef;
use studiodb::sql::ast::{CreateTableStatement, Statement};
use studiodb::storage::{KvStore, Value};
use studiodb::{Engine, EngineConfig, ExecutionResult, WhereSemantics};

/// Print welcome banner
fn print_banner(location: &str) {
    println!(
        r#"
 StudioDB - an embedded SQL engine
 Connected to {}
 Type '.help' for help, '.quit' to exit
"#,
        location
    );
}

/// Print help message
fn print_help() {
    println!(
        r#"
Commands:
  .help                 Show this help message
  .quit                 Exit StudioDB
  .tables               List all tables
  .schema [table]       Show table definitions
  .rename <old> <new>   Rename a table
  .dump <table>         Print INSERT statements for a table's rows

SQL Commands:
  CREATE TABLE ...             Create a new table
  CREATE TABLE ... AS SELECT   Create a table from literal rows
  DROP TABLE ...               Drop a table
  INSERT INTO ...              Insert rows
  SELECT ...                   Query data
  DELETE FROM ... WHERE ...    Delete rows

Examples:
  CREATE TABLE users (id INTEGER, name VARCHAR(100));
  INSERT INTO users (id, name) VALUES (1, 'Alice'), (2, 'Bob');
  SELECT * FROM users WHERE id = 1;
  CREATE TABLE tags AS SELECT 1 AS id, 'red' AS tag UNION ALL SELECT 2, 'blue';
"#
    );
}

fn print_usage() {
    println!(
        r#"Usage: studiodb [OPTIONS]

Options:
  --db <path>       Store directory (default: studiodb.db)
  --memory          Use an in-memory store
  --no-seed         Do not seed demo tables into a new store
  --filter-where    WHERE filters by the named column instead of the key
  -h, --help        Show this message"#
    );
}

/// Format query results as a table
fn format_results(columns: &[String], rows: &[Vec<Value>]) -> String {
    if columns.is_empty() && rows.is_empty() {
        return String::new();
    }

    // Calculate column widths
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();

    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                let value_len = value.to_string().chars().count();
                widths[i] = widths[i].max(value_len);
            }
        }
    }

    let mut output = String::new();

    // Header separator
    let separator: String = widths
        .iter()
        .map(|w| "-".repeat(*w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+\n", separator);

    // Header
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!(" {:^width$} ", c, width = *w))
        .collect::<Vec<_>>()
        .join("|");
    output.push_str(&format!("|{}|\n", header));
    output.push_str(&separator);

    // Rows
    for row in rows {
        let row_str: String = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:>width$} ", v.to_string(), width = *w))
            .collect::<Vec<_>>()
            .join("|");
        output.push_str(&format!("|{}|\n", row_str));
    }

    if !rows.is_empty() {
        output.push_str(&separator);
    }

    output.push_str(&format!("{} row(s) returned\n", rows.len()));

    output
}

fn print_result(result: &ExecutionResult) {
    match result.message() {
        Some(msg) => println!("{}", msg),
        None => print!("{}", format_results(&result.columns, &result.rows)),
    }
}

fn table_sql(table: &TableDef) -> String {
    Statement::CreateTable(CreateTableStatement {
        table_name: table.name.clone(),
        columns: table.columns.clone(),
    })
    .to_string()
}

/// Execute a SQL statement
async fn execute_sql<S: KvStore>(sql: &str, engine: &Engine<S>) {
    let sql = sql.trim();
    if sql.is_empty() {
        return;
    }

    match engine.execute_statement(sql).await {
        Ok(result) => print_result(&result),
        Err(e) => eprintln!("{}", e),
    }
}

/// Handle special dot commands. Returns false when the REPL should exit.
async fn handle_special_command<S: KvStore>(cmd: &str, engine: &Engine<S>) -> bool {
    let parts: Vec<&str> = cmd.split_whitespace().collect();

    match parts.first().copied() {
        Some(".help") => print_help(),
        Some(".quit") | Some(".exit") => return false,
        Some(".tables") => match engine.get_schema().await {
            Ok(tables) if tables.is_empty() => println!("No tables found."),
            Ok(tables) => {
                println!("Tables:");
                for table in tables {
                    println!("  {}", table.name);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },
        Some(".schema") => match engine.get_schema().await {
            Ok(tables) => {
                let wanted = parts.get(1).copied();
                let mut found = false;
                for table in tables
                    .iter()
                    .filter(|t| wanted.map_or(true, |name| t.name == name))
                {
                    found = true;
                    println!("{};", table_sql(table));
                }
                if let (Some(name), false) = (wanted, found) {
                    eprintln!("Error: table \"{}\" not found", name);
                }
            }
            Err(e) => eprintln!("Error: {}", e),
        },
        Some(".rename") => match (parts.get(1), parts.get(2)) {
            (Some(old), Some(new)) => match engine.rename_table(old, new).await {
                Ok(()) => println!("Table \"{}\" renamed to \"{}\".", old, new),
                Err(e) => eprintln!("{}", e),
            },
            _ => eprintln!("Usage: .rename <old> <new>"),
        },
        Some(".dump") => match parts.get(1) {
            Some(table) => match engine.dump_table(table).await {
                Ok(statements) => {
                    for stmt in statements {
                        println!("{};", stmt);
                    }
                }
                Err(e) => eprintln!("{}", e),
            },
            None => eprintln!("Usage: .dump <table>"),
        },
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            eprintln!("Type '.help' for available commands.");
        }
        None => {}
    }
    true
}

/// Main REPL loop
async fn run_repl<S: KvStore>(engine: Engine<S>) -> anyhow::Result<()> {
    let created = engine
        .initialize()
        .await
        .context("failed to open the store")?;
    print_banner(&engine.connections().store().location());
    if created {
        println!(" Created a new store.\n");
    }

    let mut rl = DefaultEditor::new()?;
    let mut input_buffer = String::new();

    loop {
        let prompt = if input_buffer.is_empty() {
            "studiodb> "
        } else {
            "     ...> "
        };

        let line = match rl.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                input_buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();

        // Handle special commands
        if input_buffer.is_empty() && trimmed.starts_with('.') {
            let _ = rl.add_history_entry(trimmed);
            if !handle_special_command(trimmed, &engine).await {
                break;
            }
            continue;
        }

        // Empty line ends a multi-line statement
        if trimmed.is_empty() {
            if !input_buffer.is_empty() {
                let sql = std::mem::take(&mut input_buffer);
                let _ = rl.add_history_entry(sql.trim());
                execute_sql(&sql, &engine).await;
            }
            continue;
        }

        input_buffer.push_str(&line);
        input_buffer.push('\n');

        // Check if statement is complete (ends with semicolon)
        if trimmed.ends_with(';') {
            let sql = std::mem::take(&mut input_buffer);
            let _ = rl.add_history_entry(sql.trim());
            execute_sql(&sql, &engine).await;
        }
    }

    println!("Goodbye!");
    Ok(())
}

struct Args {
    config: EngineConfig,
    memory: bool,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut config = EngineConfig::new();
    let mut memory = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                let path = args.next().context("--db needs a path")?;
                config = config.path(PathBuf::from(path));
            }
            "--memory" => memory = true,
            "--no-seed" => config = config.seed_demo(false),
            "--filter-where" => config = config.where_semantics(WhereSemantics::ColumnFilter),
            "-h" | "--help" => {
                print_usage();
                return Ok(None);
            }
            other => bail!("unknown argument: {}", other),
        }
    }

    Ok(Some(Args { config, memory }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let Some(args) = parse_args()? else {
        return Ok(());
    };

    if args.memory {
        run_repl(Engine::in_memory(args.config)).await
    } else {
        let engine = Engine::open(args.config).context("failed to open the store")?;
        run_repl(engine).await
    }
}
