use brrtmvc::cli::run_cli;
use brrtmvc::logging::{init_logging, LogConfig};
use brrtmvc::runtime_config::RuntimeConfig;

fn main() -> anyhow::Result<()> {
    let _guard = init_logging(&LogConfig::from_env())?;
    RuntimeConfig::from_env().apply();
    run_cli()
}
