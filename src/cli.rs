use std::net::IpAddr;

use clap::{Args, Parser, Subcommand};

/// AgentGuard: governance gateway SDK for AI agents
#[derive(Parser)]
#[command(name = "agentguard", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub gateway: GatewayArgs,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GatewayArgs {
    /// Gateway base URL
    #[arg(long, env = "AGENTGUARD_URL", default_value = "http://localhost:8080", global = true)]
    pub gateway_url: String,

    /// Agent API key
    #[arg(long, env = "AGENTGUARD_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,
}

#[derive(Args, Clone)]
pub struct ListenArgs {
    /// Address to bind the webhook listener to
    #[arg(long, env = "AGENTGUARD_WEBHOOK_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to bind
    #[arg(short, long, env = "AGENTGUARD_WEBHOOK_PORT", default_value = "5000")]
    pub port: u16,

    /// Shared secret for X-AgentGuard-Signature verification
    #[arg(long, env = "AGENTGUARD_WEBHOOK_SECRET", hide_env_values = true)]
    pub secret: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the approval webhook receiver
    Webhook {
        #[command(subcommand)]
        command: WebhookCommands,
    },

    /// Query and manage approvals
    Approval {
        #[command(subcommand)]
        command: ApprovalCommands,
    },
}

#[derive(Subcommand)]
pub enum WebhookCommands {
    /// Serve until interrupted, logging every decision received
    Serve {
        #[command(flatten)]
        listen: ListenArgs,
    },
}

#[derive(Subcommand)]
pub enum ApprovalCommands {
    /// Print the current status of an approval
    Status { approval_id: String },
    /// Submit a justification for a pending approval
    Submit {
        approval_id: String,
        #[arg(long)]
        reason: String,
    },
    /// Start the webhook receiver and block until the approval is decided
    Wait {
        approval_id: String,
        /// Seconds to wait before giving up
        #[arg(long, default_value = "300")]
        timeout: u64,
        #[command(flatten)]
        listen: ListenArgs,
    },
}
