//! memberd - runs every configured party as a node on one in-process network
//! and submits member flows as the local party.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use member_flows::{FinalisedMember, LocalNetwork, MemberNode};
use member_types::MemberModel;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::NodeConfig;

/// Member node CLI
#[derive(Parser)]
#[command(name = "memberd")]
#[command(about = "Issue and edit co-signed member records", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMBER_CONFIG")]
    config: Option<String>,

    /// Log level (overrides the configuration file)
    #[arg(long, env = "MEMBER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "MEMBER_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct MemberArgs {
    /// Party allowed to view the member
    #[arg(long)]
    viewer: String,

    #[arg(long)]
    title: String,

    #[arg(long)]
    first_name: String,

    #[arg(long)]
    last_name: String,
}

impl MemberArgs {
    fn model(&self) -> MemberModel {
        MemberModel::new(&self.viewer, &self.title, &self.first_name, &self.last_name)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Issue a new member
    Issue(MemberArgs),

    /// Issue a member, then edit it once
    RoundTrip {
        #[command(flatten)]
        member: MemberArgs,

        /// First name to set in the edit
        #[arg(long)]
        new_first_name: String,

        /// Observer to name in the edit
        #[arg(long)]
        observer: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = NodeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let network = LocalNetwork::new();
    let mut nodes = Vec::new();
    let names = config
        .network
        .party_names()
        .context("Invalid party name in configuration")?;
    for name in names {
        let name = name.to_string();
        let node = network
            .start_node(&name, config.flows.clone())
            .await
            .with_context(|| format!("Failed to start node for {}", name))?;
        nodes.push(node);
    }
    info!(parties = nodes.len(), "Local network started");

    // party_names() puts the local party first
    let Some(local) = nodes.first() else {
        bail!("no parties configured");
    };

    let result = run(local, cli.command).await;

    for node in nodes {
        node.shutdown().await;
    }
    result
}

async fn run(node: &MemberNode, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Issue(member) => {
            let issued = node.issue(member.model()).await.context("Issue failed")?;
            print_member(&issued)?;
        }
        Command::RoundTrip {
            member,
            new_first_name,
            observer,
        } => {
            let issued = node.issue(member.model()).await.context("Issue failed")?;
            print_member(&issued)?;

            let mut model = MemberModel {
                first_name: Some(new_first_name),
                ..member.model()
            };
            if let Some(observer) = observer {
                model = model.with_observer(observer);
            }
            let edited = node
                .edit(issued.member.state.linear_id.to_string(), model)
                .await
                .context("Edit failed")?;
            print_member(&edited)?;
        }
    }
    Ok(())
}

fn print_member(finalised: &FinalisedMember) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(finalised)?);
    Ok(())
}
