//! heapdb CLI
//!
//! Command-line driver for a single heap table.

use std::error::Error;

use clap::{Parser, Subcommand};
use heapdb::relation::Identifier;
use heapdb::storage::{FileDevice, MemoryVolume};
use heapdb::{Config, DataType, DbRelation, Handle, HeapTable, Schema, SyncStrategy, Value, ValueDict};
use tracing_subscriber::{fmt, EnvFilter};

/// heapdb CLI
#[derive(Parser, Debug)]
#[command(name = "heapdb")]
#[command(about = "Heap storage engine driver")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./heapdb_data")]
    data_dir: String,

    /// Table name
    #[arg(short, long, default_value = "_test")]
    table: String,

    /// Table schema as name:type pairs, e.g. "a:int,b:text"
    #[arg(short, long, default_value = "a:int,b:text")]
    schema: String,

    /// Only fsync when the table is closed
    #[arg(long)]
    lazy_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the table
    Create {
        /// Open the table instead if it already exists
        #[arg(long)]
        if_not_exists: bool,
    },

    /// Drop the table and remove its file
    Drop,

    /// Insert a row
    Insert {
        /// Column values as column=value
        values: Vec<String>,
    },

    /// Update columns of a row
    Update {
        /// Block id of the row
        block: u32,

        /// Record id of the row
        record: u16,

        /// New column values as column=value
        values: Vec<String>,
    },

    /// Delete a row
    Delete {
        /// Block id of the row
        block: u32,

        /// Record id of the row
        record: u16,
    },

    /// Print every row
    Scan {
        /// Only print these columns (comma separated)
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },

    /// Run the storage engine self test against an in-memory volume
    SelfTest,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,heapdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("heapdb v{}", heapdb::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if let Commands::SelfTest = args.command {
        self_test()?;
        println!("self test ok");
        return Ok(());
    }

    let schema: Schema = args.schema.parse()?;
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_strategy(if args.lazy_sync {
            SyncStrategy::OnClose
        } else {
            SyncStrategy::EveryWrite
        })
        .build();

    tracing::debug!("Data directory: {}", args.data_dir);
    let mut table = HeapTable::on_disk(&config, &args.table, schema);

    match args.command {
        Commands::Create { if_not_exists } => {
            if if_not_exists {
                table.create_if_not_exists()?;
            } else {
                table.create()?;
            }
            println!("created {}", table.path().display());
        }
        Commands::Drop => {
            table.drop()?;
            println!("dropped {}", args.table);
            return Ok(());
        }
        Commands::Insert { values } => {
            table.open()?;
            let row = parse_values(table.schema(), &values)?;
            let handle = table.insert(&row)?;
            println!("inserted {}", handle);
        }
        Commands::Update {
            block,
            record,
            values,
        } => {
            table.open()?;
            let row = parse_values(table.schema(), &values)?;
            table.update(Handle::new(block, record), &row)?;
            println!("updated ({}, {})", block, record);
        }
        Commands::Delete { block, record } => {
            table.open()?;
            table.del(Handle::new(block, record))?;
            println!("deleted ({}, {})", block, record);
        }
        Commands::Scan { columns } => {
            table.open()?;
            scan(&mut table, columns.as_deref())?;
        }
        Commands::SelfTest => unreachable!("handled above"),
    }

    table.close()?;
    Ok(())
}

fn scan(table: &mut HeapTable<FileDevice>, columns: Option<&[Identifier]>) -> Result<(), Box<dyn Error>> {
    let handles = table.select()?;
    for handle in &handles {
        let row = match columns {
            Some(columns) => table.project_columns(*handle, columns)?,
            None => table.project(*handle)?,
        };
        let fields: Vec<String> = row
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!("{} {}", handle, fields.join(" "));
    }
    println!("{} rows", handles.len());
    Ok(())
}

/// Parse `column=value` arguments using the schema's column types
fn parse_values(schema: &Schema, values: &[String]) -> Result<ValueDict, Box<dyn Error>> {
    let mut row = ValueDict::new();
    for arg in values {
        let (name, raw) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected column=value, got {}", arg))?;
        let column = schema
            .get(name)
            .ok_or_else(|| format!("unknown column: {}", name))?;
        let value = match column.data_type {
            DataType::Int => Value::Int(raw.parse()?),
            DataType::Text => Value::Text(raw.to_string()),
            DataType::Boolean => {
                return Err(format!("column {} has unsupported type {}", name, column.data_type).into())
            }
        };
        row.insert(name.to_string(), value);
    }
    Ok(row)
}

/// Exercise create/insert/select/project/update/delete/drop end to end
fn self_test() -> Result<(), Box<dyn Error>> {
    let volume = MemoryVolume::new();
    let schema = Schema::new()
        .column("a", DataType::Int)
        .column("b", DataType::Text);

    let mut table = HeapTable::in_memory(&volume, "_test_create_drop", schema.clone());
    table.create()?;
    table.drop()?;

    let mut table = HeapTable::in_memory(&volume, "_test_data", schema);
    table.create_if_not_exists()?;

    let mut row = ValueDict::new();
    row.insert("a".to_string(), Value::Int(12));
    row.insert("b".to_string(), Value::from("Hello!"));
    table.insert(&row)?;

    let handles = table.select()?;
    if handles.len() != 1 {
        return Err(format!("expected 1 row, found {}", handles.len()).into());
    }
    if table.project(handles[0])? != row {
        return Err("projected row differs from inserted row".into());
    }

    let mut new_values = ValueDict::new();
    new_values.insert("b".to_string(), Value::from("Goodbye"));
    table.update(handles[0], &new_values)?;
    let updated = table.project(handles[0])?;
    if updated.get("a") != Some(&Value::Int(12)) || updated.get("b") != Some(&Value::from("Goodbye")) {
        return Err("update did not apply".into());
    }

    table.del(handles[0])?;
    if !table.select()?.is_empty() {
        return Err("deleted row still selected".into());
    }

    table.drop()?;
    if !volume.names().is_empty() {
        return Err("dropped tables left storage behind".into());
    }
    Ok(())
}
