//! Gerrit Relay CLI - command-line access to a review server
//!
//! Provides subcommands for writing a client config, checking connectivity,
//! and reading changes, comments and file contents.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use gerrit_relay::client::config::{load_config, write_config};
use gerrit_relay::client::{ChangeField, ChangeQuery, CommentMap};
use gerrit_relay::{ClientConfig, GerritClient};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gerrit-relay")]
#[command(about = "Query a Gerrit review server", long_about = None)]
struct Cli {
    /// Path of the client config file
    #[arg(short, long, default_value = "gerrit-relay.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new config file
    Init {
        /// Server root URL
        #[arg(long)]
        url: String,

        /// HTTP username
        #[arg(long)]
        username: Option<String>,

        /// HTTP password
        #[arg(long)]
        password: Option<String>,

        /// Refuse mutating requests
        #[arg(long)]
        readonly: bool,

        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,
    },

    /// Check that the server is reachable
    Probe,

    /// Show the authenticated account
    Whoami,

    /// Show one change
    Change {
        /// Change identifier
        id: String,

        /// Annotations to include (e.g. LABELS, CURRENT_REVISION)
        #[arg(short = 'o', long = "field", value_parser = parse_field)]
        fields: Vec<ChangeField>,
    },

    /// List changes
    List {
        /// Filter group; terms in one group are ANDed, groups are ORed
        #[arg(short, long = "query", required = true)]
        queries: Vec<String>,

        /// Annotations to include
        #[arg(short = 'o', long = "field", value_parser = parse_field)]
        fields: Vec<ChangeField>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Number of results to skip
        #[arg(short = 'S', long)]
        skip: Option<u32>,
    },

    /// Show published comments of a change
    Comments {
        /// Change identifier
        change: String,
    },

    /// Show your drafts on a change
    Drafts {
        /// Change identifier
        change: String,
    },

    /// List files touched by a revision
    Files {
        /// Change identifier
        change: String,

        /// Revision (sha, patch set number, or `current`)
        #[arg(default_value = "current")]
        revision: String,
    },

    /// Print the content of a file at a commit
    File {
        /// Project name
        project: String,

        /// Change identifier
        change: String,

        /// Commit sha of the revision
        commit: String,

        /// File path
        path: String,
    },
}

fn parse_field(raw: &str) -> std::result::Result<ChangeField, String> {
    let tag = raw.trim().to_ascii_uppercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(tag))
        .map_err(|_| format!("unknown change field '{raw}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_comments(comments: &CommentMap) {
    for (path, thread) in comments {
        println!("{path}");
        for comment in thread {
            let line = comment
                .info
                .line
                .map(|line| line.to_string())
                .unwrap_or_else(|| "-".to_string());
            let message = comment.info.message.as_deref().unwrap_or("");
            println!("  [{}] line {}: {}", comment.id(), line, message);
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init {
        url,
        username,
        password,
        readonly,
        insecure,
    } = cli.command
    {
        init_tracing(false);
        let config = ClientConfig {
            url,
            username,
            password,
            readonly,
            allow_invalid_certificates: insecure,
            ..ClientConfig::default()
        };
        write_config(&cli.config, &config)
            .with_context(|| format!("failed to write {}", cli.config.display()))?;
        println!("Wrote config to {}", cli.config.display());
        return Ok(());
    }

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    init_tracing(config.debug);
    let client = GerritClient::new(config)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),

        Commands::Probe => {
            if !client.probe().await {
                bail!("server at {} is not reachable", client.config().url);
            }
            match client.server_version().await {
                Some(version) => println!("Connected (server version {version})"),
                None => println!("Connected"),
            }
        }

        Commands::Whoami => match client.get_self().await {
            Some(account) => print_json(&account)?,
            None => bail!("could not fetch the current account"),
        },

        Commands::Change { id, fields } => match client.get_change(&id, &fields).await {
            Some(change) => print_json(&change)?,
            None => bail!("could not fetch change {id}"),
        },

        Commands::List {
            queries,
            fields,
            limit,
            skip,
        } => {
            let mut query = ChangeQuery::new().fields(&fields);
            for raw in &queries {
                query = query.group(raw.split_whitespace());
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            if let Some(skip) = skip {
                query = query.skip(skip);
            }

            let changes = client.list_changes(&query).await;
            for change in &changes {
                println!(
                    "{:>7}  {:<10} {:<20} {}",
                    change.number, change.status, change.project, change.subject
                );
            }
            if changes.last().and_then(|c| c.more_changes) == Some(true) {
                println!("(more results available)");
            }
        }

        Commands::Comments { change } => match client.get_comments(&change).await {
            Some(comments) => print_comments(&comments),
            None => bail!("could not fetch comments of {change}"),
        },

        Commands::Drafts { change } => match client.get_drafts(&change).await {
            Some(drafts) => print_comments(&drafts),
            None => bail!("could not fetch drafts of {change}"),
        },

        Commands::Files { change, revision } => {
            match client.get_revision_files(&change, &revision).await {
                Some(files) => {
                    for (path, info) in &files {
                        println!("{} {}", info.status.as_deref().unwrap_or("M"), path);
                    }
                }
                None => bail!("could not fetch files of {change}/{revision}"),
            }
        }

        Commands::File {
            project,
            change,
            commit,
            path,
        } => match client
            .get_file_content(&project, &change, &commit, &path)
            .await
        {
            Some(content) => print!("{}", content.text),
            None => bail!("could not fetch {path} at {commit}"),
        },
    }

    Ok(())
}
