use courier_core::logging;

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    logging::init_logging();

    if let Err(err) = CliCommand::run_from_args().await {
        eprintln!("courier error: {:#}", err);
        std::process::exit(1);
    }
}
