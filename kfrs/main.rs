use anyhow::Result;
use clap::Parser;
use kfrs_common::logging::{self, LogOutput};
use kfrs_config::{APP_NAME, APP_VERSION, Args, Config};
use tokio::runtime::Builder;
use tracing::{error, info};

fn main() -> Result<()> {
    let args = Args::parse();

    let _logging_guard = logging::initialize(APP_NAME, &args.log_level, LogOutput::from(args.log_output.as_str()))?;
    info!("{APP_NAME} v{APP_VERSION} started");

    let config = Config::from(&args);
    let rt = Builder::new_multi_thread().enable_all().build()?;

    if let Err(error) = rt.block_on(kfrs_core::run(config)) {
        error!("{APP_NAME} v{APP_VERSION} terminated with an error: {error}");
        Err(error.into())
    } else {
        info!("{APP_NAME} v{APP_VERSION} stopped");
        Ok(())
    }
}
