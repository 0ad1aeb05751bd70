//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 船端所有组件共用的错误域；任何错误都止步于发现它的组件边界，
//!   被转换为重连、丢弃或合成响应，不会终结长期运行的循环。
//!
//! ## 设计要求（What）
//! - 每个变体映射到稳定错误码（`ship.*`），日志按错误码聚合；
//! - 本地缓冲阶段的错误发生在分配请求 ID 之前，不会留下任何挂起条目。

use spark_codec_tunnel::RequestId;
use spark_transport_tcp::TransportError;
use std::io;
use thiserror::Error;

/// 船端错误。
#[derive(Debug, Error)]
pub enum ShipError {
    /// 监听或建连等传输层失败。
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 隧道未连接，请求被快速拒绝。
    #[error("tunnel to offshore proxy is not connected")]
    TunnelNotConnected,

    /// 写帧失败，隧道随之断开。
    #[error("failed to send request {request_id} over the tunnel: {source}")]
    TunnelSend {
        /// 未送达的请求。
        request_id: RequestId,
        /// 底层失败。
        #[source]
        source: TransportError,
    },

    /// 客户端在请求缓冲完整之前关闭了连接。
    #[error("client closed the connection after {buffered} bytes, before a complete request")]
    ClientClosed {
        /// 已缓冲的字节数。
        buffered: usize,
    },

    /// 请求超出允许的缓冲上限。
    #[error("client request exceeds the {limit} byte buffering limit")]
    RequestTooLarge {
        /// 生效的上限。
        limit: usize,
    },

    /// 读取客户端连接失败。
    #[error("client connection failed: {0}")]
    ClientIo(#[source] io::Error),

    /// 同一请求 ID 被重复登记。
    #[error("request {request_id} already has a pending client")]
    DuplicateRequestId {
        /// 冲突的请求 ID。
        request_id: RequestId,
    },

    /// 分发队列已关闭。
    #[error("request dispatcher is no longer running")]
    DispatcherStopped,
}

impl ShipError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ShipError::Transport(err) => err.code(),
            ShipError::TunnelNotConnected => "ship.tunnel.not_connected",
            ShipError::TunnelSend { .. } => "ship.tunnel.send_failed",
            ShipError::ClientClosed { .. } => "ship.client.closed_early",
            ShipError::RequestTooLarge { .. } => "ship.client.request_too_large",
            ShipError::ClientIo(_) => "ship.client.io",
            ShipError::DuplicateRequestId { .. } => "ship.pending.duplicate",
            ShipError::DispatcherStopped => "ship.dispatcher.stopped",
        }
    }
}
