//! 船端代理进程入口。

use anyhow::Context;
use clap::Parser;
use spark_ship::ShipProxy;
use spark_tunnel::{config::ShipArgs, run_until_ctrl_c, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, log_level) = ShipArgs::parse().resolve()?;
    telemetry::init(&log_level)?;

    let proxy = ShipProxy::bind(&config)
        .await
        .with_context(|| format!("failed to start ship proxy on {}", config.listen_addr))?;
    info!(
        listen = %proxy.local_addr(),
        offshore = %config.offshore_addr(),
        reconnect_interval_ms = config.reconnect_interval_ms,
        "ship proxy started"
    );
    run_until_ctrl_c(proxy.run()).await
}
