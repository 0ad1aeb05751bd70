//! # 配置装配
//!
//! ## 优先级（What）
//! 1. 命令行参数与环境变量（`clap` 的 `env` 支持，两者等价）；
//! 2. `--config` 指向的 TOML 文件；
//! 3. 各字段缺省值。
//!
//! ## 文件格式
//! ```toml
//! log_level = "debug"
//!
//! [ship]
//! listen_addr = "0.0.0.0:8080"
//! offshore_host = "offshore.example"
//! offshore_port = 9090
//!
//! [offshore]
//! listen_addr = "0.0.0.0:9090"
//! max_concurrent_exchanges = 256
//! ```
//! 两个进程读同一种文件，各取自己的段落，另一段被忽略。

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use spark_offshore::OffshoreConfig;
use spark_ship::ShipConfig;
use std::path::{Path, PathBuf};

/// 未通过 `RUST_LOG` 指定过滤规则时的日志级别。
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// 配置文件内容。
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TunnelFile {
    /// 日志级别或 `EnvFilter` 指令。
    pub log_level: Option<String>,
    /// 船端段落。
    pub ship: ShipConfig,
    /// 岸端段落。
    pub offshore: OffshoreConfig,
}

impl TunnelFile {
    /// 解析 TOML 文本。
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid tunnel configuration")
    }

    /// 读取并解析配置文件。
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in config file {}", path.display()))
    }

    fn load_optional(path: Option<&Path>) -> anyhow::Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

/// 船端进程参数。
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ship-proxy", version, about = "Multiplex local HTTP clients over one tunnel to the offshore proxy")]
pub struct ShipArgs {
    /// TOML 配置文件路径。
    #[arg(long, env = "TUNNEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// 本地客户端监听地址。
    #[arg(long, env = "SHIP_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// 岸端主机名。
    #[arg(long, env = "OFFSHORE_HOST")]
    pub offshore_host: Option<String>,

    /// 岸端隧道端口。
    #[arg(long, env = "OFFSHORE_PORT")]
    pub offshore_port: Option<u16>,

    /// 建连失败后的重试间隔（毫秒）。
    #[arg(long)]
    pub reconnect_interval_ms: Option<u64>,

    /// 日志级别。
    #[arg(long, env = "TUNNEL_LOG")]
    pub log_level: Option<String>,
}

impl ShipArgs {
    /// 合并文件与参数，得到最终配置与日志级别。
    pub fn resolve(self) -> anyhow::Result<(ShipConfig, String)> {
        let file = TunnelFile::load_optional(self.config.as_deref())?;
        Ok(self.apply(file))
    }

    fn apply(self, file: TunnelFile) -> (ShipConfig, String) {
        let mut config = file.ship;
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if let Some(offshore_host) = self.offshore_host {
            config.offshore_host = offshore_host;
        }
        if let Some(offshore_port) = self.offshore_port {
            config.offshore_port = offshore_port;
        }
        if let Some(reconnect_interval_ms) = self.reconnect_interval_ms {
            config.reconnect_interval_ms = reconnect_interval_ms;
        }
        let log_level = pick_log_level(self.log_level, file.log_level);
        (config, log_level)
    }
}

/// 岸端进程参数。
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "offshore-proxy", version, about = "Execute tunneled HTTP requests on behalf of the ship proxy")]
pub struct OffshoreArgs {
    /// TOML 配置文件路径。
    #[arg(long, env = "TUNNEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// 隧道监听地址。
    #[arg(long, env = "OFFSHORE_LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// 同时进行的出站调用上限。
    #[arg(long)]
    pub max_concurrent_exchanges: Option<usize>,

    /// 出站请求整体超时（毫秒）。
    #[arg(long)]
    pub request_timeout_ms: Option<u64>,

    /// 日志级别。
    #[arg(long, env = "TUNNEL_LOG")]
    pub log_level: Option<String>,
}

impl OffshoreArgs {
    /// 合并文件与参数，得到最终配置与日志级别。
    pub fn resolve(self) -> anyhow::Result<(OffshoreConfig, String)> {
        let file = TunnelFile::load_optional(self.config.as_deref())?;
        Ok(self.apply(file))
    }

    fn apply(self, file: TunnelFile) -> (OffshoreConfig, String) {
        let mut config = file.offshore;
        if let Some(listen_addr) = self.listen_addr {
            config.listen_addr = listen_addr;
        }
        if self.max_concurrent_exchanges.is_some() {
            config.max_concurrent_exchanges = self.max_concurrent_exchanges;
        }
        if self.request_timeout_ms.is_some() {
            config.request_timeout_ms = self.request_timeout_ms;
        }
        let log_level = pick_log_level(self.log_level, file.log_level);
        (config, log_level)
    }
}

fn pick_log_level(flag: Option<String>, file: Option<String>) -> String {
    flag.or(file)
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned())
}
