use crate::score::{run_check, run_score, CheckArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use risk_predictors::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Risk Predictors",
    about = "Score reoffending-risk predictors over HTTP or from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score one assessment from JSON files and print the result
    Score(ScoreArgs),
    /// Load the model and scoring config, then report whether they are usable
    Check(CheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Check(args) => run_check(args),
    }
}
