//! 岸端代理进程入口。

use anyhow::Context;
use clap::Parser;
use spark_offshore::TunnelServer;
use spark_tunnel::{config::OffshoreArgs, run_until_ctrl_c, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, log_level) = OffshoreArgs::parse().resolve()?;
    telemetry::init(&log_level)?;

    let server = TunnelServer::bind(&config)
        .await
        .with_context(|| format!("failed to start offshore proxy on {}", config.listen_addr))?;
    info!(
        listen = %server.local_addr(),
        max_concurrent_exchanges = ?config.max_concurrent_exchanges,
        "offshore proxy started"
    );
    run_until_ctrl_c(server.run()).await
}
