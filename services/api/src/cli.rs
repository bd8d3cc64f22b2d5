use crate::demo::{run_demo, run_windows, DemoArgs, WindowsArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use enrollments::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Enrollments API",
    about = "Run and inspect the course enrollment service from the command line",
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
    /// Report which calendar windows are open according to the calendar service
    Windows(WindowsArgs),
    /// Run a scripted enrollment against built-in fixture services
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
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Windows(args) => run_windows(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
