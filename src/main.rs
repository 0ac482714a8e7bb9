use clap::Parser;
use m42_dev_mcp::cli::{self, Args};
use m42_dev_mcp::core::config::ConfigLoader;
use m42_dev_mcp::logging;
use std::process::ExitCode;
use std::time::Duration;

/// Bound on waiting for blocking work (the stdin reader) when the runtime stops.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match ConfigLoader::load(&args.global.overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let _logging_guard = match logging::init(Some(&config.project_root)) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error: failed to initialize logging: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start async runtime: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let code = match runtime.block_on(cli::run(args.command, config)) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    };

    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    code
}
