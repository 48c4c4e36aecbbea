use anyhow::Result;
use clap::Parser;
use convoy_server::{serve, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()))
        .format_timestamp_millis()
        .init();

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tokio::select! {
        result = serve(listener, config) => result,
        _ = tokio::signal::ctrl_c() => {
            log::info!("shutting down");
            Ok(())
        }
    }
}
