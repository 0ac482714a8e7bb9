pub mod args;
pub mod commands;

pub use args::{CallArgs, GlobalArgs};
use crate::core::config::ServerConfig;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "m42-dev-mcp")]
#[command(version = crate::VERSION)]
#[command(about = "MCP tool server for m42-dev projects")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Without a subcommand the server speaks MCP over stdio. Logs go to stderr."
)]
pub struct Args {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Serve tools over stdio (default)",
        long_about = "Serve reads newline-delimited JSON-RPC requests from stdin and writes responses to stdout until stdin closes or the process is signalled.",
        after_help = "Example:\n    m42-dev-mcp serve --project-root ./my-project"
    )]
    Serve,
    #[command(
        about = "Print the registered tools as JSON",
        after_help = "Example:\n    m42-dev-mcp tools"
    )]
    Tools,
    #[command(
        about = "Invoke one tool and print its result",
        long_about = "Call runs a single tool with the given JSON arguments, prints the rendered text and exits 1 if the tool reported an error.",
        after_help = "Example:\n    m42-dev-mcp call m42_list_features --args '{\"status\":\"active\"}'"
    )]
    Call(CallArgs),
}

pub async fn run(command: Option<Command>, config: ServerConfig) -> crate::Result<ExitCode> {
    match command.unwrap_or(Command::Serve) {
        Command::Serve => commands::serve(config).await,
        Command::Tools => commands::tools(config),
        Command::Call(call_args) => commands::call(config, call_args).await,
    }
}
