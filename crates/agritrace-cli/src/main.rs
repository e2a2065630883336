//! agritrace
//!
//! Command-line host for the product-chain mirror. Runs the demo lifecycle,
//! inspects seeded or exported chains, and queries a running backend.
//!
//! Usage:
//!   agritrace demo
//!   agritrace list   [--status <s>] [--stage <s>] [--pool] [--chains <file>]
//!   agritrace show   <trace-code> [--chains <file>]
//!   agritrace verify <trace-code> [--backend <url>] [--token <t>] [--summary]
//!   agritrace health [--backend <url>]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use agritrace_client::{BackendClient, ClientConfig};
use agritrace_core::{ChainStatus, ProductChain, Stage, TraceCode, TraceError};
use agritrace_state::{demo_chains, parse_chains, ChainStore, StoreConfig};

mod demo;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "agritrace", version, about = "Agricultural product traceability mirror")]
struct Args {
    /// JSON config file with `store` and `client` sections.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Load chains from a JSON export instead of the built-in demo data.
    #[arg(long, global = true)]
    chains: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the tomato lifecycle on a fresh store and print the result.
    Demo,

    /// List chains, optionally filtered.
    List {
        /// draft, on_chain or terminated.
        #[arg(long)]
        status: Option<ChainStatus>,
        /// Committed chains at this stage (producer, processor, inspector, seller).
        #[arg(long)]
        stage: Option<Stage>,
        /// Only raw materials open to any processor.
        #[arg(long, default_value_t = false)]
        pool: bool,
    },

    /// Print one chain and its merged attributes.
    Show {
        trace_code: String,
    },

    /// Check a trace code against the backend ledger.
    Verify {
        trace_code: String,
        /// Backend base URL. Overrides the config file.
        #[arg(long)]
        backend: Option<String>,
        /// Bearer token for the backend session.
        #[arg(long)]
        token: Option<String>,
        /// Also request a generated summary of the product history.
        #[arg(long, default_value_t = false)]
        summary: bool,
    },

    /// Print backend, ledger node and summary service status.
    Health {
        #[arg(long)]
        backend: Option<String>,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct HostConfig {
    store: StoreConfig,
    client: ClientConfig,
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,agritrace=debug")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => HostConfig::default(),
    };
    debug!(?config, "configuration loaded");

    match args.command {
        Command::Demo => {
            let store = ChainStore::new(config.store);
            let (chain, merged) = demo::run(&store).await?;
            print_json(&json!({ "chain": chain, "mergedAttributes": merged }))
        }

        Command::List { status, stage, pool } => {
            let store = load_store(config.store, args.chains.as_deref())?;
            let chains: Vec<ProductChain> = if pool {
                store.pool()
            } else if let Some(stage) = stage {
                store.by_stage(stage)
            } else {
                store.snapshot()
            };
            let chains = chains
                .into_iter()
                .filter(|c| status.map_or(true, |s| c.status == s));

            println!("{:<4} {:<20} {:<24} {:<11} {:<10} {}", "ID", "TRACE CODE", "PRODUCT", "STATUS", "STAGE", "RECORDS");
            for c in chains {
                println!(
                    "{:<4} {:<20} {:<24} {:<11} {:<10} {}",
                    c.id.0,
                    c.trace_code.as_ref().map(TraceCode::as_str).unwrap_or("-"),
                    c.product_name,
                    c.status,
                    c.current_stage,
                    c.records.len()
                );
            }
            Ok(())
        }

        Command::Show { trace_code } => {
            let store = load_store(config.store, args.chains.as_deref())?;
            let chain = store
                .by_trace_code(&trace_code)
                .ok_or_else(|| TraceError::TraceCodeNotFound(trace_code.clone()))?;
            let merged = store.merged_attributes(chain.id)?;
            print_json(&json!({
                "chain": chain,
                "mergedAttributes": merged,
                "hasAmendments": chain.has_amendments(),
            }))
        }

        Command::Verify { trace_code, backend, token, summary } => {
            let code: TraceCode = trace_code
                .parse()
                .with_context(|| format!("parsing trace code {trace_code}"))?;
            let client = backend_client(config.client, backend);
            if let Some(token) = token {
                client.set_token(token);
            }

            let verified = client
                .verify_trace_code(&code)
                .await
                .with_context(|| format!("verifying {code} at {}", client.config().base_url))?;
            info!(trace_code = %code, exists = verified.exists, "trace code verified");
            if !verified.exists {
                print_json(&verified)?;
                bail!("trace code {code} is not on the ledger");
            }

            let chain_data = client
                .product_chain_data(&code)
                .await
                .context("fetching chain data")?;
            let summary = if summary {
                let data = serde_json::to_value(&chain_data).context("encoding chain data")?;
                Some(
                    client
                        .generate_summary(&code, Some(&data))
                        .await
                        .context("generating summary")?,
                )
            } else {
                None
            };
            print_json(&json!({ "verify": verified, "chainData": chain_data, "summary": summary }))
        }

        Command::Health { backend } => {
            let client = backend_client(config.client, backend);
            let health = client.health().await.context("checking backend health")?;
            if !health.is_healthy() {
                print_json(&health)?;
                bail!("ledger node is {}", health.status);
            }
            let info = client.chain_info().await.context("fetching chain info")?;
            // The summary service is optional; report it without failing.
            let ai = match client.ai_health().await {
                Ok(ai) => json!(ai),
                Err(e) => json!({ "status": "unreachable", "connected": false, "error": e.to_string() }),
            };
            print_json(&json!({ "health": health, "chain": info, "ai": ai }))
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> anyhow::Result<HostConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

fn load_store(config: StoreConfig, chains: Option<&Path>) -> anyhow::Result<ChainStore> {
    let chains = match chains {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading chains {}", path.display()))?;
            parse_chains(&raw).with_context(|| format!("parsing chains {}", path.display()))?
        }
        None => demo_chains().context("loading demo data")?,
    };
    let store = ChainStore::new(config)
        .with_chains(chains)
        .context("loading chains into the mirror")?;
    info!(chains = store.len(), "mirror ready");
    Ok(store)
}

fn backend_client(mut config: ClientConfig, backend: Option<String>) -> BackendClient {
    if let Some(url) = backend {
        config.base_url = url;
    }
    BackendClient::new(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("encoding output")?);
    Ok(())
}
