//! # Admission：请求 ID 分配与入队
//!
//! ## 核心意图（Why）
//! - 请求在隧道上的发送顺序必须与 ID 分配顺序一致；
//!   把“分配 ID、登记挂起条目、入队”放进同一把锁，使三者对其他客户端表现为一个原子步骤。
//!
//! ## 行为契约（What）
//! - ID 从 1 开始，每次 +1，进程内不复用；
//! - 条目先登记后入队，保证响应路由器查表时条目已经存在；
//! - 分发器已停止时撤回条目，并把连接还给调用方。
//!
//! ## 风险提示（Trade-offs）
//! - 锁内只做内存操作（DashMap 插入与无界通道发送），不会跨越任何 `.await`。

use bytes::Bytes;
use parking_lot::Mutex;
use spark_codec_tunnel::RequestId;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpStream, sync::mpsc};

use crate::{
    error::ShipError,
    pending::{PendingClientConnection, PendingTable},
};

/// 已分配 ID、等待分发的请求。
#[derive(Debug)]
pub struct QueuedRequest {
    /// 隧道请求 ID。
    pub request_id: RequestId,
    /// 本地客户端发来的原始请求字节。
    pub raw: Bytes,
}

/// 分发队列的接收端，由 [`RequestDispatcher`](crate::RequestDispatcher) 独占。
pub type RequestQueue = mpsc::UnboundedReceiver<QueuedRequest>;

/// 请求准入：ID 分配、挂起登记与入队的唯一入口。
#[derive(Debug)]
pub struct Admission {
    next_id: Mutex<RequestId>,
    pending: Arc<PendingTable>,
    queue: mpsc::UnboundedSender<QueuedRequest>,
}

impl Admission {
    /// 创建准入器及其配对的分发队列。
    pub fn new(pending: Arc<PendingTable>) -> (Self, RequestQueue) {
        let (queue, receiver) = mpsc::unbounded_channel();
        (
            Self {
                next_id: Mutex::new(RequestId::FIRST),
                pending,
                queue,
            },
            receiver,
        )
    }

    /// 为一个完整缓冲的请求分配 ID、登记客户端并入队。
    ///
    /// 失败时连接已随条目一起被丢弃，客户端会观察到连接关闭。
    pub fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        raw: Bytes,
    ) -> Result<RequestId, ShipError> {
        let mut next_id = self.next_id.lock();
        let request_id = *next_id;
        self.pending
            .insert(PendingClientConnection::new(request_id, peer, stream))?;
        if self.queue.send(QueuedRequest { request_id, raw }).is_err() {
            self.pending.take(request_id);
            return Err(ShipError::DispatcherStopped);
        }
        *next_id = request_id.next();
        Ok(request_id)
    }
}
