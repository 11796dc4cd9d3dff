use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use policy_catalog::catalog::service::PolicyService;
use policy_catalog::catalog::sqlite::SqliteStore;
use policy_catalog::catalog::types::{Facet, NewPolicyVersion, PolicyFilters, ResolveRequest};
use policy_catalog::config::{self, CatalogConfig};
use policy_catalog::logging;

#[derive(Parser)]
#[command(name = "policy-catalog")]
#[command(version, about = "Versioned policy catalog with semantic version resolution")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a policy version from a JSON document ("-" reads stdin)
    Create {
        file: PathBuf,
        /// YAML definition file, replacing `definitionYaml` from the document
        #[arg(long)]
        definition: Option<PathBuf>,
    },
    /// Show a policy version, or the latest one when no version is given
    Get {
        name: String,
        version: Option<String>,
        /// Print only the YAML definition
        #[arg(long)]
        definition: bool,
    },
    /// Resolve a version with a strategy
    Resolve {
        name: String,
        #[arg(long, default_value = "latest_major")]
        strategy: String,
        #[arg(long)]
        base_version: Option<String>,
    },
    /// Resolve a JSON array of `{name, strategy, baseVersion}` requests ("-" reads stdin)
    Batch { file: PathBuf },
    /// List versions of a policy, highest first
    Versions {
        name: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// List latest versions of all policies
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long = "category")]
        categories: Vec<String>,
        #[arg(long = "provider")]
        providers: Vec<String>,
        #[arg(long = "platform")]
        platforms: Vec<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Distinct categories, providers or platforms
    Facets {
        #[arg(value_parser = parse_facet)]
        facet: Facet,
    },
    /// Show documentation of a version
    Docs {
        name: String,
        version: String,
        /// Single page; all pages when omitted
        #[arg(long)]
        page: Option<String>,
    },
    /// Create or replace a documentation page from a markdown file ("-" reads stdin)
    PutDoc {
        name: String,
        version: String,
        page: String,
        file: PathBuf,
    },
}

fn parse_facet(s: &str) -> Result<Facet, String> {
    s.parse::<Facet>()
        .map_err(|_| format!("unknown facet '{}', expected categories, providers or platforms", s))
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Command, service: PolicyService<SqliteStore>) -> anyhow::Result<()> {
    match command {
        Command::Create { file, definition } => {
            let mut candidate: NewPolicyVersion = serde_json::from_str(&read_input(&file)?)
                .with_context(|| format!("Invalid policy version document {:?}", file))?;
            if let Some(definition) = definition {
                candidate.definition_yaml = read_input(&definition)?;
            }
            print_json(&service.create_policy_version(candidate).await?)
        }
        Command::Get {
            name,
            version,
            definition,
        } => {
            let found = service
                .resolve_reference(&name, version.as_deref(), version.is_none())
                .await?;
            if definition {
                print!("{}", found.data.definition_yaml);
                Ok(())
            } else {
                print_json(&found)
            }
        }
        Command::Resolve {
            name,
            strategy,
            base_version,
        } => print_json(
            &service
                .resolve(&name, &strategy, base_version.as_deref())
                .await?,
        ),
        Command::Batch { file } => {
            let requests: Vec<ResolveRequest> = serde_json::from_str(&read_input(&file)?)
                .with_context(|| format!("Invalid batch request {:?}", file))?;
            print_json(&service.resolve_batch(requests).await?)
        }
        Command::Versions {
            name,
            page,
            page_size,
        } => print_json(&service.list_policy_versions(&name, page, page_size).await?),
        Command::List {
            search,
            categories,
            providers,
            platforms,
            page,
            page_size,
        } => print_json(
            &service
                .list_policies(PolicyFilters {
                    search,
                    categories,
                    providers,
                    platforms,
                    page,
                    page_size,
                })
                .await?,
        ),
        Command::Facets { facet } => print_json(&service.distinct_values(facet).await?),
        Command::Docs {
            name,
            version,
            page,
        } => match page {
            Some(page) => print_json(&service.get_doc(&name, &version, &page).await?),
            None => print_json(&service.get_all_docs(&name, &version).await?),
        },
        Command::PutDoc {
            name,
            version,
            page,
            file,
        } => print_json(
            &service
                .upsert_doc(&name, &version, &page, read_input(&file)?)
                .await?,
        ),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = CatalogConfig::load(cli.config.as_deref())?;
    let _guard = logging::init(&config.logging, &config::log_dir())?;

    let db_path = cli.db.unwrap_or_else(|| config.db_path());
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {:?}", parent))?;
    }

    let store = SqliteStore::open(
        &db_path,
        config.database.pool_size,
        Duration::from_millis(config.database.busy_timeout),
    )?;
    let service = PolicyService::new(Arc::new(store), config.resolution.clone());

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, service))
}
