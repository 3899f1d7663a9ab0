use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Map, Value};
use shelfbase_core::{
    log_warn, Collection, FileStore, LogLevel, ReadManyOptions, Response, ShelfConfig,
    SortDirection, Where,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shelfbase")]
#[command(about = "shelfbase CLI - document collections in a local JSON store")]
#[command(version)]
struct Cli {
    /// Store file (defaults to $SHELFBASE_DATA, then shelfbase.json)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// off, error, warn, info, debug or trace (defaults to $SHELFBASE_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Collection key
    key: String,

    /// JSON schema file applied to writes
    #[arg(long)]
    schema: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert one document
    Create {
        #[command(flatten)]
        target: Target,
        /// Document as a JSON object
        data: String,
    },
    /// Insert a JSON array of documents, all or nothing
    CreateMany {
        #[command(flatten)]
        target: Target,
        /// JSON array of objects
        data: String,
    },
    /// First document whose fields equal the query
    Read {
        #[command(flatten)]
        target: Target,
        query: String,
    },
    /// Merge a patch into the first matching document
    Update {
        #[command(flatten)]
        target: Target,
        query: String,
        patch: String,
    },
    /// Delete the first matching document
    Remove {
        #[command(flatten)]
        target: Target,
        query: String,
    },
    /// Filter, sort and page through a collection
    Find {
        #[command(flatten)]
        target: Target,
        /// Condition (or array of conditions) as JSON
        #[arg(long = "where")]
        where_clause: Option<String>,
        /// field:asc or field:desc, repeatable
        #[arg(long = "order-by")]
        order_by: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        skip: Option<usize>,
    },
    /// Import records from a JSON file
    /// Format: { "collection_key": [records...], ... }
    Import {
        file: PathBuf,
        #[arg(long)]
        schema: Option<PathBuf>,
    },
    /// Export collections to a JSON file
    Export {
        file: PathBuf,
        /// Export only this collection
        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ShelfConfig::from_env();
    if let Some(ref raw) = cli.log_level {
        let level = LogLevel::parse(raw).ok_or_else(|| anyhow!("Unknown log level: {}", raw))?;
        config = config.with_log_level(level);
    }
    if let Some(data) = cli.data {
        config = config.with_data_path(data);
    }
    config.apply_logging();

    let store = Arc::new(
        FileStore::open(&config.data_path)
            .with_context(|| format!("Failed to open store: {}", config.data_path.display()))?,
    );

    run(&store, &config, cli.command).await
}

async fn run(store: &Arc<FileStore>, config: &ShelfConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Create { target, data } => {
            let coll = collection(store, config, &target).await?;
            report(&coll.create(parse_json(&data, "data")?).await)
        }
        Commands::CreateMany { target, data } => {
            let coll = collection(store, config, &target).await?;
            let items = match parse_json(&data, "data")? {
                Value::Array(items) => items,
                _ => bail!("data must be a JSON array"),
            };
            report(&coll.create_many(items).await)
        }
        Commands::Read { target, query } => {
            let coll = collection(store, config, &target).await?;
            report(&coll.read(&parse_json(&query, "query")?).await)
        }
        Commands::Update {
            target,
            query,
            patch,
        } => {
            let coll = collection(store, config, &target).await?;
            let query = parse_json(&query, "query")?;
            let patch = parse_json(&patch, "patch")?;
            report(&coll.update(&query, &patch).await)
        }
        Commands::Remove { target, query } => {
            let coll = collection(store, config, &target).await?;
            report(&coll.remove(&parse_json(&query, "query")?).await)
        }
        Commands::Find {
            target,
            where_clause,
            order_by,
            limit,
            skip,
        } => {
            let coll = collection(store, config, &target).await?;
            let options = find_options(where_clause.as_deref(), &order_by, limit, skip)?;
            report(&coll.read_many(&options).await)
        }
        Commands::Import { file, schema } => {
            import_data(store, config, &file, schema.as_deref()).await
        }
        Commands::Export { file, key } => export_data(store, config, &file, key.as_deref()).await,
    }
}

/// Bind `target` and make sure its array exists in the store
async fn collection(
    store: &Arc<FileStore>,
    config: &ShelfConfig,
    target: &Target,
) -> Result<Collection<Value, FileStore>> {
    let schema = target.schema.as_deref().map(load_schema).transpose()?;
    let coll = Collection::open(Arc::clone(store), target.key.as_str(), schema)
        .await
        .with_context(|| format!("Failed to open collection: {}", target.key))?;
    Ok(coll.with_config(config))
}

fn load_schema(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in: {}", path.display()))
}

fn parse_json(raw: &str, what: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("Invalid JSON for {}: {}", what, raw))
}

/// `field`, `field:asc` or `field:desc`
fn parse_order_key(raw: &str) -> Result<(String, SortDirection)> {
    let (field, direction) = match raw.rsplit_once(':') {
        Some((field, direction)) => {
            let direction = SortDirection::from_value(&Value::String(direction.to_string()))
                .ok_or_else(|| anyhow!("Unknown sort direction in '{}'", raw))?;
            (field, direction)
        }
        None => (raw, SortDirection::Asc),
    };
    if field.is_empty() {
        bail!("Missing field name in '{}'", raw);
    }
    Ok((field.to_string(), direction))
}

fn find_options(
    where_clause: Option<&str>,
    order_by: &[String],
    limit: Option<usize>,
    skip: Option<usize>,
) -> Result<ReadManyOptions> {
    let mut options = ReadManyOptions::new();
    if let Some(raw) = where_clause {
        options = options.with_where(Where::from(parse_json(raw, "where")?));
    }
    for raw in order_by {
        let (field, direction) = parse_order_key(raw)?;
        options = options.order_by(field, direction);
    }
    if let Some(limit) = limit {
        options = options.with_limit(limit);
    }
    if let Some(skip) = skip {
        options = options.with_skip(skip);
    }
    Ok(options)
}

/// Print the envelope; a non-ok status becomes the process error
fn report<T: Serialize>(response: &Response<T>) -> Result<()> {
    let json = serde_json::to_string_pretty(response).with_context(|| "Failed to serialize response")?;
    println!("{}", json);
    if response.is_ok() {
        Ok(())
    } else {
        Err(anyhow!(
            "{}",
            response.message.as_deref().unwrap_or("operation failed")
        ))
    }
}

async fn import_data(
    store: &Arc<FileStore>,
    config: &ShelfConfig,
    file: &Path,
    schema: Option<&Path>,
) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;

    let data: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid JSON in file: {}", file.display()))?;

    let mut total_docs = 0;

    for (key, records) in data {
        let records = match records {
            Value::Array(records) => records,
            _ => bail!("Collection '{}' must be an array", key),
        };

        let target = Target {
            key: key.clone(),
            schema: schema.map(Path::to_path_buf),
        };
        let coll = collection(store, config, &target).await?;

        let imported = coll
            .create_many(records)
            .await
            .into_result()
            .map_err(|message| anyhow!("Failed to import into '{}': {}", key, message))?;

        println!("Imported {} documents into '{}'", imported.len(), key);
        total_docs += imported.len();
    }

    println!(
        "Total: {} documents imported to {}",
        total_docs,
        store.path().display()
    );
    Ok(())
}

async fn export_data(
    store: &Arc<FileStore>,
    config: &ShelfConfig,
    file: &Path,
    key_filter: Option<&str>,
) -> Result<()> {
    let keys = match key_filter {
        Some(key) => vec![key.to_string()],
        None => store.keys(),
    };

    let mut output: Map<String, Value> = Map::new();
    let mut total_docs = 0;

    for key in keys {
        let docs = match export_collection(store, config, &key).await {
            Ok(docs) => docs,
            // A full export skips entries that are not collections
            Err(err) if key_filter.is_none() => {
                log_warn!("Skipping '{}': {:#}", key, err);
                continue;
            }
            Err(err) => return Err(err),
        };

        println!("Exporting {} documents from '{}'", docs.len(), key);
        total_docs += docs.len();
        output.insert(key, Value::Array(docs));
    }

    let json =
        serde_json::to_string_pretty(&output).with_context(|| "Failed to serialize to JSON")?;

    fs::write(file, json)
        .with_context(|| format!("Failed to write to file: {}", file.display()))?;

    println!(
        "Total: {} documents exported to {}",
        total_docs,
        file.display()
    );
    Ok(())
}

/// Every document of `key` as stored JSON
async fn export_collection(
    store: &Arc<FileStore>,
    config: &ShelfConfig,
    key: &str,
) -> Result<Vec<Value>> {
    let coll = Collection::<Value, FileStore>::new(Arc::clone(store), key, None)
        .with_context(|| format!("Failed to open collection: {}", key))?
        .with_config(config);

    let docs = coll
        .read_many(&ReadManyOptions::new())
        .await
        .into_result()
        .map_err(|message| anyhow!("Failed to read collection '{}': {}", key, message))?;

    docs.iter()
        .map(|doc| doc.to_value())
        .collect::<shelfbase_core::Result<Vec<Value>>>()
        .with_context(|| format!("Failed to serialize collection: {}", key))
}
