//! # PendingTable：等待响应的本地客户端仓储
//!
//! ## 核心意图（Why）
//! - 基于 `DashMap` 的并发安全存储：监听器插入、响应路由器移除，两者在不同任务上并发进行；
//! - 表只通过“插入”与“移除并取出”两个操作暴露，其他组件无法直接触碰内部映射。
//!
//! ## 行为契约（What）
//! - `insert`：同一请求 ID 至多一个条目，重复登记返回
//!   [`ShipError::DuplicateRequestId`](crate::error::ShipError::DuplicateRequestId)；
//! - `take`：原子地移除并返回条目，保证每个条目恰好被消费一次。
//!
//! ## 风险提示（Trade-offs）
//! - 未提供过期清理：隧道断开时已发出的请求永远等不到响应，其条目会一直留到进程结束。
//!   这是保留下来的尽力而为语义，`len()` 可用于观测泄漏规模。

use dashmap::{DashMap, mapref::entry::Entry};
use spark_codec_tunnel::RequestId;
use std::{io, net::SocketAddr};
use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::error::ShipError;

/// 一个已缓冲完请求、正在等待响应的本地客户端连接。
#[derive(Debug)]
pub struct PendingClientConnection {
    request_id: RequestId,
    peer: SocketAddr,
    stream: TcpStream,
}

impl PendingClientConnection {
    /// 登记客户端连接。
    pub fn new(request_id: RequestId, peer: SocketAddr, stream: TcpStream) -> Self {
        Self {
            request_id,
            peer,
            stream,
        }
    }

    /// 关联的请求 ID。
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// 客户端地址。
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// 原样写出响应字节、flush 并关闭连接。
    pub async fn complete(mut self, response: &[u8]) -> io::Result<()> {
        self.stream.write_all(response).await?;
        self.stream.flush().await?;
        self.stream.shutdown().await
    }
}

/// 请求 ID 到等待中客户端的并发映射。
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<RequestId, PendingClientConnection>,
}

impl PendingTable {
    /// 创建空表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记等待中的客户端。
    pub fn insert(&self, connection: PendingClientConnection) -> Result<(), ShipError> {
        let request_id = connection.request_id();
        match self.entries.entry(request_id) {
            Entry::Occupied(_) => Err(ShipError::DuplicateRequestId { request_id }),
            Entry::Vacant(vacant) => {
                vacant.insert(connection);
                Ok(())
            }
        }
    }

    /// 移除并取出条目。
    pub fn take(&self, request_id: RequestId) -> Option<PendingClientConnection> {
        self.entries.remove(&request_id).map(|(_, connection)| connection)
    }

    /// 当前等待中的客户端数量。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 表是否为空。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
