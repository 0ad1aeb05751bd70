use serde::Deserialize;
use std::time::Duration;

/// 船端配置。
///
/// 所有字段都有缺省值，TOML 文件只需写出要改动的项。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ShipConfig {
    /// 面向本地客户端的监听地址。
    pub listen_addr: String,
    /// 岸端主机名。
    pub offshore_host: String,
    /// 岸端隧道端口。
    pub offshore_port: u16,
    /// 建连失败后的固定重试间隔（毫秒）。
    pub reconnect_interval_ms: u64,
    /// 单个本地请求允许缓冲的最大字节数。
    pub max_request_bytes: usize,
}

impl ShipConfig {
    /// 隧道目标地址 `host:port`。
    pub fn offshore_addr(&self) -> String {
        format!("{}:{}", self.offshore_host, self.offshore_port)
    }

    /// 重连间隔。
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_owned(),
            offshore_host: "localhost".to_owned(),
            offshore_port: 9090,
            reconnect_interval_ms: 5_000,
            max_request_bytes: 16 * 1024 * 1024,
        }
    }
}
