mod routes;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use grime_view::{create, middleware_for, ViewOptions};

// ── CLI ─────────────────────────────────────────────────────────────

/// Serve, render and check a view tree.
#[derive(Parser, Debug)]
#[command(name = "grime-server", version, about)]
struct Cli {
    /// Directory holding `filter/`, `helper/` and `template/`. Overrides the
    /// individual VIEW_*_PATH settings.
    #[arg(long, env = "VIEW_DIR", global = true)]
    view_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default).
    Serve,
    /// Load every resource and render one template to stdout.
    Render {
        /// Logical template name, e.g. `example` or `emails/welcome`.
        name: String,
        /// JSON object used as the render context.
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Load every resource once and report failures (exit code 1 if any).
    Check,
}

fn load_config() -> grime_core::Config {
    grime_core::config::load_dotenv();
    grime_core::Config::from_env()
}

fn view_options(config: &grime_core::Config, cli: &Cli) -> ViewOptions {
    let options = ViewOptions::from(&config.views);
    match &cli.view_dir {
        Some(dir) => options.view_dir(dir),
        None => options,
    }
}

async fn serve(config: &grime_core::Config, options: ViewOptions) -> anyhow::Result<()> {
    config.log_summary();

    let views = middleware_for(options, config.mode)?;
    let app = routes::router(views, config.summary());

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn render(options: ViewOptions, name: &str, data: &str) -> anyhow::Result<()> {
    let context: serde_json::Value =
        serde_json::from_str(data).context("--data must be a JSON value")?;

    let pipeline = create(options);
    pipeline.load();
    let output = pipeline.render(name, &context)?;
    println!("{}", output);
    Ok(())
}

fn check(options: ViewOptions) -> anyhow::Result<bool> {
    let pipeline = create(options);
    let results = pipeline.load_report();

    let mut failed = 0usize;
    for result in &results {
        match &result.status {
            grime_view::LoadStatus::Loaded => {
                println!("  ok    {:<8} {}", result.category.to_string(), result.name);
            }
            grime_view::LoadStatus::Failed { error } => {
                failed += 1;
                println!("  FAIL  {:<8} {} ({})", result.category.to_string(), result.name, error);
            }
        }
    }

    println!();
    println!("{} loaded, {} failed", results.len() - failed, failed);
    if results.is_empty() {
        warn!("no view resources found; check the VIEW_*_PATH settings");
    }
    Ok(failed == 0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = load_config();
    let options = view_options(&config, &cli);

    match &cli.command {
        None | Some(Command::Serve) => serve(&config, options).await?,
        Some(Command::Render { name, data }) => render(options, name, data)?,
        Some(Command::Check) => {
            if !check(options)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
