use std::path::Path;

use anyhow::Context;
use colored::Colorize;

use astore_server::{AstoreServer, ServerConfig};

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("could not load configuration from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(site_url) = args.site_url {
        config.site_url = site_url;
    }

    let server = AstoreServer::new(config);
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "could not listen for ctrl-c");
            return;
        }
        tracing::info!("shutting down");
        shutdown.cancel();
    });

    let config = server.config();
    println!(
        "{} astore on {} (bucket {})",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.astore.bucket.yellow()
    );
    match config.publish_base_url().as_str() {
        "" => println!("  publishing {}", "disabled".dimmed()),
        base => println!("  publishing under {}", base.blue()),
    }
    server.serve().await.context("server failed")
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
