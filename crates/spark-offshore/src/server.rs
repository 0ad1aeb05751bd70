//! # TunnelServer：岸端隧道服务器
//!
//! ## 核心意图（Why）
//! - 单条隧道上复用着许多请求；读帧必须严格顺序进行，执行则必须并发，
//!   否则一个慢源站会挡住其后所有请求；
//! - 船端会重连，因此接受循环不会在第一条连接结束后退出。
//!
//! ## 行为契约（What）
//! - 每条连接一个读循环，每帧一个工作任务；工作任务完成后在同一连接上写回同一请求 ID 的响应帧；
//! - 写回经过连接级写锁（[`FrameWriter`]），并发完成的响应不会交错；
//! - 执行器返回本地解析错误时写回 `400 Bad Request`，帧不会被静默丢弃；
//! - 响应超出帧上限时写回 `502 Bad Gateway`。
//!
//! ## 风险提示（Trade-offs）
//! - 未配置并发上限时工作任务数量无界；配置后许可在任务内获取，读循环永不因此阻塞；
//! - 连接断开后仍在执行的任务照常完成，写回失败只记录日志。

use bytes::Bytes;
use spark_codec_tunnel::{RequestId, TunnelCodec, TunnelFrame};
use spark_http_exchange::{HttpExchange, ReqwestExchange, response};
use spark_transport_tcp::{FrameWriter, TcpChannel, TcpListener, TransportError};
use std::{fmt, net::SocketAddr, sync::Arc};
use tokio::{net::tcp::OwnedWriteHalf, sync::Semaphore};
use tracing::{debug, info, warn};

use crate::{config::OffshoreConfig, error::OffshoreError};

/// 岸端隧道服务器。
pub struct TunnelServer {
    listener: TcpListener,
    exchange: Arc<dyn HttpExchange>,
    codec: TunnelCodec,
    limiter: Option<Arc<Semaphore>>,
}

impl fmt::Debug for TunnelServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelServer")
            .field("local_addr", &self.listener.local_addr())
            .field("max_payload_len", &self.codec.max_payload_len())
            .field(
                "max_concurrent_exchanges",
                &self.limiter.as_ref().map(|limiter| limiter.available_permits()),
            )
            .finish()
    }
}

impl TunnelServer {
    /// 按配置绑定监听地址，并使用 `reqwest` 执行器。
    pub async fn bind(config: &OffshoreConfig) -> Result<Self, OffshoreError> {
        let exchange = ReqwestExchange::new(&config.exchange())?;
        Self::bind_with_exchange(config, Arc::new(exchange)).await
    }

    /// 使用给定执行器绑定监听地址。
    pub async fn bind_with_exchange(
        config: &OffshoreConfig,
        exchange: Arc<dyn HttpExchange>,
    ) -> Result<Self, OffshoreError> {
        let listener = TcpListener::bind(&config.listen_addr).await?;
        Ok(Self {
            listener,
            exchange,
            codec: config.codec(),
            limiter: config
                .max_concurrent_exchanges
                .map(|permits| Arc::new(Semaphore::new(permits.max(1)))),
        })
    }

    /// 实际绑定的地址。
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// 接受循环：每条隧道连接一个读任务。
    pub async fn run(self) {
        info!(addr = %self.listener.local_addr(), "offshore proxy listening for tunnels");
        loop {
            let channel = match self.listener.accept().await {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(error = %err, code = err.code(), "failed to accept tunnel connection");
                    continue;
                }
            };
            let connection = TunnelConnection {
                exchange: Arc::clone(&self.exchange),
                codec: self.codec,
                limiter: self.limiter.clone(),
            };
            tokio::spawn(connection.serve(channel));
        }
    }
}

struct TunnelConnection {
    exchange: Arc<dyn HttpExchange>,
    codec: TunnelCodec,
    limiter: Option<Arc<Semaphore>>,
}

impl TunnelConnection {
    async fn serve(self, channel: TcpChannel) {
        let peer = channel.peer_addr();
        if let Err(err) = channel.tune_for_tunnel() {
            debug!(%peer, error = %err, "socket tuning failed");
        }
        info!(%peer, "tunnel connection accepted");
        let (mut reader, writer) = channel.into_framed(self.codec);
        let mut frames = 0u64;
        loop {
            match reader.read_frame().await {
                Ok(Some(frame)) => {
                    frames += 1;
                    let (request_id, payload) = frame.into_parts();
                    debug!(%peer, %request_id, bytes = payload.len(), "request frame received");
                    tokio::spawn(exchange_one(
                        Arc::clone(&self.exchange),
                        self.limiter.clone(),
                        writer.clone(),
                        request_id,
                        payload,
                    ));
                }
                Ok(None) => {
                    info!(%peer, frames, "tunnel connection closed by ship");
                    return;
                }
                Err(err) => {
                    warn!(%peer, frames, error = %err, code = err.code(), "tunnel read failed");
                    return;
                }
            }
        }
    }
}

async fn exchange_one(
    exchange: Arc<dyn HttpExchange>,
    limiter: Option<Arc<Semaphore>>,
    writer: FrameWriter<OwnedWriteHalf>,
    request_id: RequestId,
    payload: Bytes,
) {
    let _permit = match limiter {
        Some(limiter) => limiter.acquire_owned().await.ok(),
        None => None,
    };
    let response = match exchange.execute(payload).await {
        Ok(response) => response,
        Err(err) => {
            warn!(%request_id, error = %err, code = err.code(), "request rejected before exchange");
            response::bad_request(&response::failure_description(&err))
        }
    };
    if let Err(err) = write_response(&writer, request_id, response).await {
        warn!(%request_id, error = %err, code = err.code(), "failed to write response frame");
    }
}

async fn write_response(
    writer: &FrameWriter<OwnedWriteHalf>,
    request_id: RequestId,
    response: Bytes,
) -> Result<(), TransportError> {
    let len = response.len();
    match writer.write_frame(&TunnelFrame::new(request_id, response)).await {
        Err(TransportError::Codec(err)) => {
            warn!(%request_id, bytes = len, error = %err, "response does not fit in one frame");
            let fallback = response::bad_gateway(&response::failure_description(&err));
            writer.write_frame(&TunnelFrame::new(request_id, fallback)).await
        }
        Ok(()) => {
            debug!(%request_id, bytes = len, "response frame sent");
            Ok(())
        }
        Err(err) => Err(err),
    }
}
