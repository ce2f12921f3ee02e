//! Listboard admin tool
//!
//! Opens the configured storage and runs one command against it through the
//! model façade. Every command prints JSON on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use listboard_core::tripcode::{tripcode, vote_from_form};
use listboard_core::{Level, Node, OrderBy, ROOT_NODE_ID};
use listboard_store::{storage, Model, Settings};
use serde_json::json;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listboard")]
#[command(about = "Inspect and administer a Listboard database", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./listboard.toml when present)
    #[arg(short, long, global = true, env = "LISTBOARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open and ping the configured storage
    Check,
    /// Show the lists of a domain
    Lists {
        #[arg(short, long)]
        domain: String,
        /// Page size (defaults to items_per_page)
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(short, long, default_value_t = 0)]
        offset: usize,
        /// Sort order, e.g. "vote DESC, created ASC"
        #[arg(long, default_value = "created DESC")]
        order: String,
    },
    /// Show a single node
    Show {
        #[arg(short, long)]
        domain: String,
        #[arg(short, long)]
        id: String,
        /// Include the node's children, top voted first
        #[arg(long)]
        children: bool,
    },
    /// Post a list, item or reply
    Add {
        #[arg(short, long)]
        domain: String,
        /// Parent node; the level is derived from it
        #[arg(short, long, default_value = ROOT_NODE_ID)]
        parent: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, default_value = "")]
        body: String,
        /// Secret for the trip code; anonymous when omitted
        #[arg(long, default_value = "")]
        password: String,
        /// Vote carried by a reply: y, n or empty
        #[arg(long, default_value = "")]
        vote: String,
    },
    /// Vote on an item
    Vote {
        #[arg(short, long)]
        domain: String,
        #[arg(short, long)]
        item: String,
        /// y, n or 0
        #[arg(short, long)]
        value: String,
    },
    /// Hide a node from every read
    Hide {
        #[arg(short, long)]
        domain: String,
        #[arg(short, long)]
        id: String,
    },
    /// Domain-wide feed, newest first
    Feed {
        #[arg(short, long)]
        domain: String,
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, settings).await {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, settings: Settings) -> Result<()> {
    let db = storage::open(&settings.storage_config())
        .await
        .with_context(|| format!("Failed to open {} storage", settings.database))?;
    let model = Model::new(db.clone());

    let result = execute(&model, &settings, command).await;

    if let Err(e) = db.close().await {
        error!("Failed to close storage: {}", e);
    }
    result
}

async fn execute(model: &Model, settings: &Settings, command: Commands) -> Result<()> {
    match command {
        Commands::Check => {
            model.storage().ping().await.context("Ping failed")?;
            info!("Storage {} is reachable", settings.database);
            print_json(&json!({ "database": settings.database, "ok": true }))
        }
        Commands::Lists {
            domain,
            limit,
            offset,
            order,
        } => {
            let order_by = OrderBy::parse(&order).context("Invalid --order")?;
            let limit = limit.unwrap_or(settings.items_per_page);
            let lists = model
                .get_child_nodes(&domain, ROOT_NODE_ID, limit, offset, &order_by)
                .await?;
            let total = model.get_total(&domain, ROOT_NODE_ID).await?;
            print_json(&json!({ "total": total, "lists": lists }))
        }
        Commands::Show {
            domain,
            id,
            children,
        } => {
            let node = model
                .get_node(&domain, &id)
                .await
                .with_context(|| format!("Node {}/{} not found", domain, id))?;
            if children {
                let kids = model
                    .get_child_nodes(
                        &domain,
                        &id,
                        settings.items_per_page,
                        0,
                        &OrderBy::top_voted(),
                    )
                    .await?;
                print_json(&json!({ "path": node.path(), "node": node, "children": kids }))
            } else {
                print_json(&json!({ "path": node.path(), "node": node }))
            }
        }
        Commands::Add {
            domain,
            parent,
            title,
            body,
            password,
            vote,
        } => {
            let level = if parent == ROOT_NODE_ID {
                Level::List
            } else {
                let parent_node = model
                    .get_node(&domain, &parent)
                    .await
                    .with_context(|| format!("Parent {}/{} not found", domain, parent))?;
                parent_node
                    .level
                    .child()
                    .with_context(|| format!("{} nodes take no children", parent_node.level))?
            };

            let mut node = Node::new(&domain, &parent, level, &title);
            node.body = body;
            node.tripcode = tripcode(&password)?;
            node.vote = vote_from_form(&vote);

            let id = if level == Level::Reply {
                model.add_vote_reply(node).await?
            } else {
                node.vote = 0;
                model.add_node(node).await?
            };
            info!("Added {} {}/{}", level, domain, id);
            let stored = model.get_node(&domain, &id).await?;
            print_json(&json!({ "id": id, "level": level, "path": stored.path() }))
        }
        Commands::Vote {
            domain,
            item,
            value,
        } => {
            let delta = match value.as_str() {
                "0" => 0,
                "y" | "n" => vote_from_form(&value),
                other => anyhow::bail!("Vote must be y, n or 0, got {:?}", other),
            };
            model.vote(&domain, &item, delta).await?;
            let node = model.get_node(&domain, &item).await?;
            print_json(&json!({ "id": node.id, "vote": node.vote }))
        }
        Commands::Hide { domain, id } => {
            model.hide_node(&domain, &id).await?;
            print_json(&json!({ "id": id, "hidden": true }))
        }
        Commands::Feed { domain, limit } => {
            let nodes = model
                .get_all_nodes(&domain, limit, 0, &OrderBy::newest())
                .await?;
            print_json(&nodes)
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    println!("{}", out);
    Ok(())
}
