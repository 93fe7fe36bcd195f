use clap::Parser;
use mediagate_lib::{logger, Cli, GatewayConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Installed before the config is resolved so its warnings are kept.
    logger::init(cli.log_level);

    let config = GatewayConfig::from_cli(cli);
    mediagate_lib::run(config).await?;
    Ok(())
}
