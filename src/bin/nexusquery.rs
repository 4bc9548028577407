use bson::Bson;
use clap::{Parser, Subcommand};
use nexusquery::config::ClientConfig;
use nexusquery::errors::DbError;
use nexusquery::normalize::{Normalized, normalize};
use nexusquery::query::parse_filter_json;
use nexusquery::session::QuerySet;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nexusquery", version, about = "Compile filters and normalize records for MongoDB", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Compile a JSON filter into an aggregation pipeline")]
    Compile {
        #[arg(long, help = "Filter as JSON: {\"op\": \"$eq\", \"field\": \"age\", \"value\": 30}")]
        filter: Option<String>,
        #[arg(long)]
        skip: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long, help = "Field to sort by")]
        sort: Option<String>,
        #[arg(long, default_value = "asc", help = "asc or desc")]
        order: String,
    },
    #[command(about = "Normalize a JSON record or array of records into BSON")]
    Normalize {
        #[arg(long, help = "Record as JSON")]
        input: String,
        #[arg(long, help = "Keep the identifier field")]
        include_id: bool,
    },
    #[command(about = "Print the connection string for a TOML client config")]
    Connstr {
        #[arg(long, help = "Path to a config file (TOML). If omitted, defaults are used.")]
        config: Option<PathBuf>,
    },
}

fn run(command: Commands) -> Result<String, DbError> {
    match command {
        Commands::Compile { filter, skip, limit, sort, order } => {
            let mut set = QuerySet::new();
            if let Some(f) = filter {
                set = set.filter(parse_filter_json(&f)?);
            }
            if let Some(n) = skip {
                set = set.skip(n);
            }
            if let Some(n) = limit {
                set = set.limit(n);
            }
            if let Some(field) = sort {
                set = set.sort(field, &order);
            }
            let stages = set.build_pipeline()?.into_iter().map(Bson::Document).collect();
            Ok(Bson::Array(stages).into_relaxed_extjson().to_string())
        }
        Commands::Normalize { input, include_id } => {
            let value: serde_json::Value = serde_json::from_str(&input)?;
            let out = match normalize(&value, include_id)? {
                Normalized::Document(d) => Bson::Document(d),
                Normalized::Sequence(items) => Bson::Array(items),
            };
            Ok(out.into_relaxed_extjson().to_string())
        }
        Commands::Connstr { config } => {
            let cfg = match config {
                Some(path) => ClientConfig::from_file(&path)?,
                None => ClientConfig::default(),
            };
            Ok(cfg.apply_env()?.connection_string())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if std::env::var_os("NEXUSQUERY_LOG_DIR").is_some()
        && let Err(e) = nexusquery::logger::configure_from_env()
    {
        eprintln!("warning: logging disabled: {e}");
    }
    match run(cli.command) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
