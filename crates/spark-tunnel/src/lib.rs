#![doc = r#"
# spark-tunnel

进程装配层：`ship-proxy` 与 `offshore-proxy` 两个二进制共用的配置加载、日志安装与停机等待。

- [`config`]：TOML 文件与命令行/环境变量的合并；
- [`telemetry`]：`tracing-subscriber` 的 `fmt + EnvFilter` 安装；
- [`run_until_ctrl_c`]：运行服务直到收到 Ctrl-C。
"#]

pub mod config;
pub mod telemetry;

use anyhow::Context;
use std::future::Future;
use tracing::info;

/// 运行服务 Future，直到它自行结束或进程收到 Ctrl-C。
pub async fn run_until_ctrl_c<F>(service: F) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = service => {
            info!("service loop exited");
            Ok(())
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("ctrl-c received; shutting down");
            Ok(())
        }
    }
}
