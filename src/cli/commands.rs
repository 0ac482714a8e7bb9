use crate::cli::args::CallArgs;
use crate::core::config::ServerConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::registry::ToolRegistry;
use crate::mcp::McpServer;
use crate::tools::register_all_tools;
use crate::Result;
use anyhow::Context;
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Registry with every built-in tool plus the context they run in.
pub fn build_dispatcher(config: &ServerConfig) -> Dispatcher {
    let executor = Arc::new(config.command_executor());
    let mut registry = ToolRegistry::new();
    register_all_tools(&mut registry, executor);
    Dispatcher::new(Arc::new(registry), config.execution_context())
}

pub async fn serve(config: ServerConfig) -> Result<ExitCode> {
    info!(
        project_root = %config.project_root.display(),
        m42_path = %config.m42_path.display(),
        timeout_ms = config.default_timeout.as_millis() as u64,
        "starting MCP server"
    );

    let dispatcher = Arc::new(build_dispatcher(&config));
    let shutdown = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(shutdown.clone()));

    let server = McpServer::with_shutdown(dispatcher, shutdown);
    server.serve_stdio().await?;
    signals.abort();

    info!("MCP server stopped");
    Ok(ExitCode::SUCCESS)
}

pub fn tools(config: ServerConfig) -> Result<ExitCode> {
    let dispatcher = build_dispatcher(&config);
    let listing = serde_json::to_string_pretty(&dispatcher.list_tools())
        .context("failed to render tool list")?;
    println!("{}", listing);
    Ok(ExitCode::SUCCESS)
}

pub async fn call(config: ServerConfig, args: CallArgs) -> Result<ExitCode> {
    let arguments: Value = serde_json::from_str(&args.arguments)
        .with_context(|| format!("--args is not valid JSON: {}", args.arguments))?;

    let dispatcher = build_dispatcher(&config);
    let cancel = CancellationToken::new();
    let signals = tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = dispatcher
        .call_tool(&args.name, arguments, Some(cancel))
        .await;
    signals.abort();

    if let Some(text) = result.first_text() {
        println!("{}", text);
    }
    Ok(if result.is_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
    token.cancel();
}
