use crate::demo::{run_demo, run_evaluate, DemoArgs, EvaluateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use product_compliance::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Product Compliance",
    about = "Serve, evaluate and demonstrate product compliance checklists",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the periodic re-evaluation (default command)
    Serve(ServeArgs),
    /// Derive a compliance status from checklist answers and dates
    Evaluate(EvaluateArgs),
    /// Run an in-memory walkthrough from approval to a degrade alert
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the seconds between scheduled re-evaluations
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) recompute_interval_secs: Option<u64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Evaluate(args) => run_evaluate(args),
        Command::Demo(args) => run_demo(args),
    }
}
