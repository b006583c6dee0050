use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentguard::{
    ApprovalClient, GuardConfig, WaitOutcome, WebhookServer, WebhookServerConfig,
};

mod cli;

use cli::{ApprovalCommands, Cli, Commands, ListenArgs, WebhookCommands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads `env = ...` fallbacks.
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "agentguard=info,tower_http=info".into()),
    );
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    let result = match args.command {
        Commands::Webhook {
            command: WebhookCommands::Serve { listen },
        } => {
            let server = WebhookServer::new(webhook_config(&listen));
            server.serve().await.context("webhook server failed")
        }
        Commands::Approval { command } => {
            let env = GuardConfig::from_env();
            let config = GuardConfig::new(
                args.gateway.gateway_url,
                args.gateway.api_key.unwrap_or_default(),
            )
            .with_webhook(env.webhook_url, env.webhook_secret);
            handle_approval_command(config, command).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

fn webhook_config(listen: &ListenArgs) -> WebhookServerConfig {
    WebhookServerConfig {
        host: listen.host,
        port: listen.port,
        secret: listen.secret.clone().filter(|s| !s.is_empty()),
    }
}

async fn handle_approval_command(
    config: GuardConfig,
    command: ApprovalCommands,
) -> anyhow::Result<()> {
    match command {
        ApprovalCommands::Status { approval_id } => {
            let client = ApprovalClient::new(config)?;
            let status = client
                .get_status(&approval_id)
                .await
                .with_context(|| format!("failed to query approval {}", approval_id))?;
            if !status.status.is_terminal() {
                tracing::info!(approval_id = %approval_id, "approval not decided yet");
            }
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        ApprovalCommands::Submit { approval_id, reason } => {
            let client = ApprovalClient::new(config)?;
            let resp = client
                .submit_reason(&approval_id, &reason)
                .await
                .with_context(|| format!("failed to submit reason for {}", approval_id))?;
            println!("{}", resp.message);
        }
        ApprovalCommands::Wait {
            approval_id,
            timeout,
            listen,
        } => {
            let config = match listen.secret.clone().filter(|s| !s.is_empty()) {
                Some(secret) => {
                    let url = config.webhook_url.clone();
                    config.with_webhook(url, Some(secret))
                }
                None => config,
            };
            let server = WebhookServer::new(WebhookServerConfig {
                host: listen.host,
                port: listen.port,
                ..WebhookServerConfig::from_guard_config(&config)
            });
            let handle = server.spawn().await?;
            let callback_url = config
                .webhook_url
                .clone()
                .unwrap_or_else(|| handle.webhook_url());
            println!("Waiting for approval {} on {}", approval_id, callback_url);

            let outcome = server
                .wait_for_approval(&approval_id, Duration::from_secs(timeout))
                .await;
            handle.shutdown().await?;

            match outcome? {
                WaitOutcome::Decided(decision) => {
                    println!("{}", serde_json::to_string_pretty(&decision)?);
                }
                WaitOutcome::TimedOut => {
                    anyhow::bail!("no decision for {} within {}s", approval_id, timeout);
                }
                WaitOutcome::Cancelled => {
                    anyhow::bail!("wait for {} was cancelled", approval_id);
                }
            }
        }
    }
    Ok(())
}
