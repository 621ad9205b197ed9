use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use docflow::{
    client::{describe_transitions, ApiClient, StatusPoller},
    collaborators::{notifier_from_config, remote_store_from_config},
    config::Config,
    ingest::Ingestor,
    server::Server,
    workflow::{DirectoryScanner, SeenFiles, WorkflowEngine, WorkflowRun, WorkflowState},
};

#[derive(Parser)]
#[command(name = "docflow", version, about = "Document automation pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and the background directory scan
    Serve,
    /// Upload a document and print how its run progressed
    Upload {
        file: PathBuf,
        #[arg(long)]
        recipient: String,
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
    },
    /// Poll the status endpoint until the current run is terminal
    Watch {
        #[arg(long, default_value = "http://localhost:5000")]
        server: String,
        #[arg(long, default_value_t = 1)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Upload {
            file,
            recipient,
            server,
        } => upload(&server, &file, &recipient).await,
        Command::Watch {
            server,
            interval_secs,
        } => watch(&server, Duration::from_secs(interval_secs)).await,
    }
}

async fn serve() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    info!("Loaded configuration: {:?}", config);

    tokio::fs::create_dir_all(&config.server.upload_dir)
        .await
        .with_context(|| format!("cannot create {}", config.server.upload_dir.display()))?;

    let seen = SeenFiles::new();
    let engine = Arc::new(WorkflowEngine::new(
        WorkflowState::new(),
        remote_store_from_config(&config),
        notifier_from_config(&config),
        config.server.upload_dir.clone(),
    ));
    let ingestor = Arc::new(Ingestor::new(config.server.upload_dir.clone(), seen.clone()));

    let scanner = DirectoryScanner::new(
        engine.clone(),
        config.scan.interval,
        config.scan.default_recipient.clone(),
        seen,
    );
    let scan_task = scanner.spawn();

    let server = Server::new(&config, engine, ingestor);
    info!("Starting server on {}", config.server.addr);
    let result = server.start(&config.server.addr).await;
    scan_task.abort();

    Ok(result?)
}

async fn upload(server: &str, file: &std::path::Path, recipient: &str) -> anyhow::Result<()> {
    let client = Arc::new(ApiClient::new(server));
    let response = client
        .upload(file, recipient)
        .await
        .with_context(|| format!("upload of {} failed", file.display()))?;
    println!("{}", response.message);

    // The trigger answers once the run is terminal; polling reports what
    // the status endpoint now publishes for it.
    follow(client, Duration::from_secs(1)).await;

    if !response.success {
        anyhow::bail!(response.error.unwrap_or(response.message));
    }
    Ok(())
}

async fn watch(server: &str, interval: Duration) -> anyhow::Result<()> {
    follow(Arc::new(ApiClient::new(server)), interval).await;
    Ok(())
}

/// Prints step transitions until the current run is terminal or the
/// process is interrupted.
async fn follow(source: Arc<ApiClient>, interval: Duration) {
    let mut last: Option<WorkflowRun> = None;
    let handle = StatusPoller::spawn(source, interval, move |run| {
        print_transitions(last.as_ref(), run);
        last = Some(run.clone());
    });

    tokio::select! {
        run = handle.finished() => {
            if let Some(run) = run {
                info!(run_id = %run.id, status = %run.status, "Workflow finished");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping status polling");
        }
    }
}

fn print_transitions(previous: Option<&WorkflowRun>, run: &WorkflowRun) {
    for line in describe_transitions(previous, run) {
        println!("{}", line);
    }
}
