use clap::Parser;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qbridge_relayer::{Args, Relayer, RelayerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // a missing .env file is fine
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("bridge relayer starting");

    let config = RelayerConfig::from_args(args)
        .inspect_err(|e| error!(error = %e, "refusing to start"))?;
    let relayer = Relayer::from_config(config)
        .inspect_err(|e| error!(error = %e, "failed to initialise clients"))?;

    relayer.run().await?;
    Ok(())
}
