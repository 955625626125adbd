use anyhow::{bail, Result};
use courier::harness::{ModuleRunner, ModuleTerminationReason};
use courier::module::gateway::Gateway;
use courier::module::peer::Peer;
use courier::module::standalone::Standalone;
use courier::module::users::Users;
use options::{Command, LogFormat};
use structopt::StructOpt;
use tracing::info;

mod options;

#[tokio::main]
async fn main() -> Result<()> {
    let (command, runner) = init();

    let termination_reason = match command {
        Command::Gateway(options) => runner.run(Gateway::new(options)).await,
        Command::Users(options) => runner.run(Users::new(options)).await,
        Command::Peer(options) => runner.run(Peer::new(options)).await,
        Command::Standalone(options) => runner.run(Standalone::new(options)).await,
    };

    exit(termination_reason)
}

fn init() -> (Command, ModuleRunner) {
    let options = options::MainOptions::from_args();

    let formatter = tracing_subscriber::fmt().with_env_filter(options.log);

    match options.log_format {
        LogFormat::Text => formatter.init(),
        LogFormat::Compact => formatter.compact().init(),
        LogFormat::Json => formatter.json().init(),
    };

    info!("courier {}", env!("CARGO_PKG_VERSION"));

    (
        options.command,
        ModuleRunner::with_status_server(options.status_server),
    )
}

fn exit(termination_reason: ModuleTerminationReason) -> Result<()> {
    if termination_reason.is_graceful() {
        Ok(())
    } else {
        bail!(termination_reason)
    }
}
