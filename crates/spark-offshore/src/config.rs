use serde::Deserialize;
use spark_codec_tunnel::{DEFAULT_MAX_PAYLOAD_LEN, TunnelCodec};
use spark_http_exchange::ExchangeConfig;
use std::time::Duration;

/// 岸端配置。
///
/// 可选项缺省即不设限，与“无截止时间、无界工作池”的基线行为一致。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct OffshoreConfig {
    /// 隧道监听地址。
    pub listen_addr: String,
    /// 同时进行的出站调用上限。
    pub max_concurrent_exchanges: Option<usize>,
    /// 出站建连超时（毫秒）。
    pub connect_timeout_ms: Option<u64>,
    /// 出站请求整体超时（毫秒）。
    pub request_timeout_ms: Option<u64>,
    /// 单帧负载上限（字节）。
    pub max_frame_bytes: usize,
}

impl OffshoreConfig {
    /// 出站执行器配置。
    pub fn exchange(&self) -> ExchangeConfig {
        ExchangeConfig {
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
        }
    }

    /// 按帧上限构造的编解码器。
    pub fn codec(&self) -> TunnelCodec {
        TunnelCodec::with_max_payload_len(self.max_frame_bytes)
    }
}

impl Default for OffshoreConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9090".to_owned(),
            max_concurrent_exchanges: None,
            connect_timeout_ms: None,
            request_timeout_ms: None,
            max_frame_bytes: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_limits_map_to_exchange_config() {
        let config = OffshoreConfig {
            connect_timeout_ms: Some(1_500),
            ..OffshoreConfig::default()
        };
        let exchange = config.exchange();
        assert_eq!(exchange.connect_timeout, Some(Duration::from_millis(1_500)));
        assert_eq!(exchange.request_timeout, None);
        assert_eq!(config.codec().max_payload_len(), DEFAULT_MAX_PAYLOAD_LEN);
    }
}
