use std::time::Duration;

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::Error;
use jt808_gateway::{
    api::Api,
    database::Database,
    protocol::{
        AlarmDialect,
        ChecksumMode,
        ProtocolConfig,
    },
    server::{
        Gateway,
        GatewayConfig,
    },
    session::Sessions,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Command::Serve {
            database_url,
            listen_address,
            api_address,
            auth_code,
            checksum_mode,
            alarm_dialect,
            idle_timeout_seconds,
        } => {
            let database = Database::connect(&database_url).await?;
            let sessions = Sessions::new();
            let shutdown = CancellationToken::new();

            let gateway = Gateway::new(
                database,
                sessions.clone(),
                GatewayConfig {
                    auth_code,
                    protocol: ProtocolConfig {
                        checksum_mode,
                        alarm_dialect,
                    },
                    idle_timeout: (idle_timeout_seconds > 0)
                        .then(|| Duration::from_secs(idle_timeout_seconds)),
                },
                shutdown.clone(),
            );
            let api = Api::new(sessions, shutdown.clone());

            let gateway_task = tokio::spawn(async move { gateway.serve(listen_address).await });
            let api_task = tokio::spawn(async move { api.serve(api_address).await });

            tokio::signal::ctrl_c().await?;
            tracing::info!("shutting down");
            shutdown.cancel();

            gateway_task.await??;
            api_task.await??;
        }
    }

    Ok(())
}

#[derive(Debug, Parser)]
pub struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the terminal-facing TCP gateway and the operator HTTP API.
    Serve {
        #[clap(long, env = "DATABASE_URL")]
        database_url: String,

        /// Address terminals connect to.
        #[clap(long, env = "JT808_LISTEN_ADDRESS", default_value = "0.0.0.0:5054")]
        listen_address: String,

        /// Address the operator HTTP API binds to.
        #[clap(long, env = "JT808_API_ADDRESS", default_value = "0.0.0.0:5000")]
        api_address: String,

        /// Auth code handed out on registration and expected back on
        /// authentication.
        #[clap(long, env = "JT808_AUTH_CODE", default_value = "TR20240902090017")]
        auth_code: String,

        /// Whether inbound frames with bad checksums are rejected or
        /// accepted with a warning.
        #[clap(long, env = "JT808_CHECKSUM_MODE", value_enum, default_value = "strict")]
        checksum_mode: ChecksumMode,

        /// Alarm-word bit layout of the deployed terminal fleet.
        #[clap(
            long,
            env = "JT808_ALARM_DIALECT",
            value_enum,
            default_value = "standard-2013"
        )]
        alarm_dialect: AlarmDialect,

        /// Close connections with no inbound frame for this many
        /// seconds; 0 disables.
        #[clap(long, env = "JT808_IDLE_TIMEOUT", default_value = "600")]
        idle_timeout_seconds: u64,
    },
}
