use std::future::Future;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use calcflow::actors::LeaseReaperActor;
use calcflow::agent::AgentPool;
use calcflow::api;
use calcflow::compiler::{compile_expression, join_tokens, tokenize};
use calcflow::config::{Config, ServerConfig};
use calcflow::core::{ExpressionId, TaskGraph};
use calcflow::orchestration::Dispatcher;
use calcflow::{Error, Result};

/// Calcflow - distributed arithmetic expression calculator
#[derive(Parser, Debug)]
#[command(name = "calcflow")]
#[command(version, about, long_about = None)]
#[command(
    after_help = "ENVIRONMENT:\n    CALCFLOW_DEBUG=1          Enable debug logging (alternative to --debug)\n    ORCHESTRATOR_ADDR         Orchestrator listen address\n    ORCHESTRATOR_URL          Orchestrator URL used by agents\n    COMPUTING_POWER           Number of concurrent agents\n    TIME_ADDITION_MS          Simulated latency per operation, likewise\n    TIME_SUBTRACTION_MS       for the other three operations\n    TIME_MULTIPLICATIONS_MS\n    TIME_DIVISIONS_MS"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Config file (default: ~/.calcflow/calcflow.toml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Run the orchestrator HTTP server
    Serve,

    /// Run an agent pool against a remote orchestrator
    Worker,

    /// Run the orchestrator and a local agent pool together
    Run,

    /// Compile an expression locally and show every stage
    Eval {
        /// The arithmetic expression, e.g. "(5+2)+4/5"
        expression: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    calcflow::log::init_with_debug(cli.debug);

    if let Command::Eval { expression } = &cli.command {
        return run_eval(expression);
    }

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => block_on(|shutdown| async move {
            let listener = TcpListener::bind(&config.server.addr).await?;
            run_server(listener, config.server, shutdown).await
        }),
        Command::Worker => block_on(|shutdown| async move {
            AgentPool::new(config.worker).run(shutdown).await;
            Ok(())
        }),
        Command::Run => block_on(|shutdown| run_all(config, shutdown)),
        Command::Eval { .. } => Ok(()),
    }
}

/// Run `f` on a fresh multi-thread runtime with a shutdown token that
/// Ctrl-C or SIGTERM cancels.
fn block_on<F, Fut>(f: F) -> Result<()>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let shutdown = CancellationToken::new();
        tokio::spawn(shutdown_signal(shutdown.clone()));
        f(shutdown).await
    })
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => return,
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}

/// Serve the API with a lease reaper alongside until `shutdown`.
async fn run_server(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let dispatcher = Dispatcher::with_capacity(config.queue_capacity);
    let reaper = LeaseReaperActor::new(dispatcher.clone(), config.task_lease()).spawn(&shutdown);

    let served = api::serve(listener, dispatcher, shutdown.clone()).await;
    reaper.stop().await;
    served
}

/// Orchestrator plus a local agent pool pointed at it.
async fn run_all(mut config: Config, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(&config.server.addr).await?;
    config.worker.orchestrator_url = format!("http://{}", listener.local_addr()?);

    let server = tokio::spawn(run_server(listener, config.server, shutdown.clone()));
    let stats = AgentPool::new(config.worker).run(shutdown.clone()).await;
    info!(
        "Local agents finished: {} completed, {} failed",
        stats.completed, stats.failed
    );

    // The pool only returns on shutdown; make sure the server sees it too.
    shutdown.cancel();
    server.await.map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn run_eval(source: &str) -> Result<()> {
    let id = ExpressionId(1);
    let tokens = tokenize(source).map_err(|source| Error::Compile { id, source })?;
    let compiled = compile_expression(id, source).map_err(|source| Error::Compile { id, source })?;
    let graph = TaskGraph::build(&compiled.tasks)?;

    println!("Tokens:  {}", join_tokens(&tokens));
    println!("Postfix: {}", join_tokens(&compiled.postfix));
    println!("Tree:    {}", compiled.tree.to_infix());
    println!("Tasks:   {}", compiled.tasks.len());
    for task_id in graph.topological_order()? {
        if let Some(task) = compiled.tasks.iter().find(|t| t.id == task_id) {
            println!(
                "  {}: {} {} {}",
                task.id, task.arg1, task.operation, task.arg2
            );
        }
    }
    match compiled.tree.evaluate() {
        Ok(value) => println!("Result:  {}", value),
        Err(e) => println!("Result:  error ({})", e),
    }
    Ok(())
}
