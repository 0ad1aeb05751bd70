//! # TunnelClient：到岸端的唯一长连接
//!
//! ## 核心意图（Why）
//! - 船端只维护一条到岸端的 TCP 连接，所有请求在其上流水线发送；
//! - 连接会因网络波动断开，客户端负责无限重连，并把状态变化广播给观察者。
//!
//! ## 状态机（What）
//! - `Disconnected → Connecting → Connected`，任一读写失败回到 `Disconnected`；
//! - 建连失败后固定间隔重试；已建立的连接丢失后立即重连；
//! - 未连接时 `send_request` 立即失败，不排队，不等待。
//!
//! ## 并发要点（How）
//! - 当前连接的写半部保存在 `link` 中，`link` 的锁同时充当“单写者”锁，
//!   一帧的帧头、负载与 flush 在锁内完成；
//! - 每条连接有一个代号（generation），断开处理只清理属于自己代号的连接，
//!   旧连接的迟到清理不会误伤新连接；
//! - 接收循环在 `read_frame` 与 `closed` 通知之间竞争，写失败时可立即打断读取。
//!
//! ## 风险提示（Trade-offs）
//! - 断开时已发送但未收到响应的请求不会重发，其本地客户端一直等待。

use bytes::Bytes;
use spark_codec_tunnel::{RequestId, TunnelCodec, TunnelFrame};
use spark_transport_tcp::{FrameReader, FrameWriter, TcpChannel};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    sync::{Mutex as AsyncMutex, Notify, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::error::ShipError;

/// 隧道连接状态。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TunnelConnectionState {
    /// 没有可用连接。
    Disconnected,
    /// 正在建连。
    Connecting,
    /// 连接可用。
    Connected,
}

impl fmt::Display for TunnelConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TunnelConnectionState::Disconnected => "disconnected",
            TunnelConnectionState::Connecting => "connecting",
            TunnelConnectionState::Connected => "connected",
        })
    }
}

struct ActiveLink {
    generation: u64,
    writer: FrameWriter<OwnedWriteHalf>,
    closed: Arc<Notify>,
}

/// 到岸端的重连隧道客户端。
pub struct TunnelClient {
    offshore_addr: String,
    reconnect_interval: Duration,
    codec: TunnelCodec,
    state: watch::Sender<TunnelConnectionState>,
    link: AsyncMutex<Option<ActiveLink>>,
    generation: AtomicU64,
    started: AtomicBool,
    inbound_tx: mpsc::UnboundedSender<TunnelFrame>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<TunnelFrame>>,
}

impl fmt::Debug for TunnelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelClient")
            .field("offshore_addr", &self.offshore_addr)
            .field("state", &self.state())
            .field("generation", &self.connection_generation())
            .finish()
    }
}

impl TunnelClient {
    /// 创建客户端，初始状态为 `Disconnected`。
    pub fn new(offshore_addr: impl Into<String>, reconnect_interval: Duration) -> Self {
        Self::with_codec(offshore_addr, reconnect_interval, TunnelCodec::new())
    }

    /// 使用指定编解码器（帧上限）创建客户端。
    pub fn with_codec(
        offshore_addr: impl Into<String>,
        reconnect_interval: Duration,
        codec: TunnelCodec,
    ) -> Self {
        let (state, _) = watch::channel(TunnelConnectionState::Disconnected);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            offshore_addr: offshore_addr.into(),
            reconnect_interval,
            codec,
            state,
            link: AsyncMutex::new(None),
            generation: AtomicU64::new(0),
            started: AtomicBool::new(false),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
        }
    }

    /// 启动建连与重连循环。
    ///
    /// 只有第一次调用会启动循环，之后返回 `None`。
    pub fn connect(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.started.swap(true, Ordering::AcqRel) {
            return None;
        }
        let client = Arc::clone(self);
        Some(tokio::spawn(async move { client.supervise().await }))
    }

    /// 当前状态。
    pub fn state(&self) -> TunnelConnectionState {
        *self.state.borrow()
    }

    /// 订阅状态变化。
    pub fn subscribe_state(&self) -> watch::Receiver<TunnelConnectionState> {
        self.state.subscribe()
    }

    /// 已成功建立的连接次数，也即当前连接的代号。
    pub fn connection_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// 把请求作为一帧写到当前连接上。
    ///
    /// 未连接时立即返回 [`ShipError::TunnelNotConnected`]；写失败会断开当前连接并触发重连。
    pub async fn send_request(&self, request_id: RequestId, payload: Bytes) -> Result<(), ShipError> {
        let mut link = self.link.lock().await;
        let Some(active) = link.as_ref() else {
            return Err(ShipError::TunnelNotConnected);
        };
        let frame = TunnelFrame::new(request_id, payload);
        let written = active.writer.write_frame(&frame).await;
        match written {
            Ok(()) => {
                debug!(%request_id, bytes = frame.payload().len(), "request frame sent");
                Ok(())
            }
            Err(source) => {
                if let Some(lost) = link.take() {
                    warn!(
                        generation = lost.generation,
                        error = %source,
                        code = source.code(),
                        "tunnel write failed; dropping connection"
                    );
                    lost.closed.notify_one();
                    self.set_state(TunnelConnectionState::Disconnected);
                }
                Err(ShipError::TunnelSend { request_id, source })
            }
        }
    }

    /// 取下一条收到的响应帧；客户端被释放后返回 `None`。
    ///
    /// 响应流只有一个消费者（响应路由器）。
    pub async fn next_response(&self) -> Option<TunnelFrame> {
        self.inbound_rx.lock().await.recv().await
    }

    fn set_state(&self, next: TunnelConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "tunnel state changed");
        }
    }

    async fn supervise(self: Arc<Self>) {
        loop {
            self.set_state(TunnelConnectionState::Connecting);
            let channel = match TcpChannel::connect(&self.offshore_addr).await {
                Ok(channel) => channel,
                Err(err) => {
                    self.set_state(TunnelConnectionState::Disconnected);
                    warn!(
                        addr = %self.offshore_addr,
                        error = %err,
                        code = err.code(),
                        retry_in_ms = self.reconnect_interval.as_millis() as u64,
                        "failed to connect to offshore proxy"
                    );
                    tokio::time::sleep(self.reconnect_interval).await;
                    continue;
                }
            };

            let peer = channel.peer_addr();
            let (reader, writer) = channel.into_framed(self.codec);
            let closed = Arc::new(Notify::new());
            let generation = {
                let mut link = self.link.lock().await;
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                *link = Some(ActiveLink {
                    generation,
                    writer,
                    closed: Arc::clone(&closed),
                });
                generation
            };
            self.set_state(TunnelConnectionState::Connected);
            info!(%peer, generation, "connected to offshore proxy");

            self.receive(reader, &closed, generation).await;
            self.release(generation).await;
        }
    }

    async fn receive(&self, mut reader: FrameReader<OwnedReadHalf>, closed: &Notify, generation: u64) {
        loop {
            tokio::select! {
                _ = closed.notified() => {
                    debug!(generation, "receive loop interrupted by write failure");
                    return;
                }
                result = reader.read_frame() => match result {
                    Ok(Some(frame)) => {
                        debug!(
                            generation,
                            request_id = %frame.request_id(),
                            bytes = frame.payload().len(),
                            "response frame received"
                        );
                        if self.inbound_tx.send(frame).is_err() {
                            return;
                        }
                    }
                    Ok(None) => {
                        warn!(generation, "offshore proxy closed the tunnel");
                        return;
                    }
                    Err(err) => {
                        warn!(generation, error = %err, code = err.code(), "tunnel read failed");
                        return;
                    }
                },
            }
        }
    }

    async fn release(&self, generation: u64) {
        let lost = {
            let mut link = self.link.lock().await;
            let owned = link
                .as_ref()
                .is_some_and(|active| active.generation == generation);
            if owned { link.take() } else { None }
        };
        if let Some(lost) = lost {
            if let Err(err) = lost.writer.shutdown().await {
                debug!(generation, error = %err, "tunnel shutdown after loss failed");
            }
            self.set_state(TunnelConnectionState::Disconnected);
        }
        info!(generation, "tunnel connection lost; reconnecting");
    }
}
