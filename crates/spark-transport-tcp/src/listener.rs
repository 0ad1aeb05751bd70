use crate::{
    TcpChannel,
    error::{ACCEPT, BIND, TransportError},
};
use std::net::SocketAddr;
use tokio::net::TcpListener as TokioTcpListener;

/// 对 Tokio `TcpListener` 的语义封装。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 船端面向本地客户端的监听器与岸端面向隧道的监听器共用同一套绑定/接受逻辑，
///   失败时统一返回带错误码的 [`TransportError`]。
///
/// ## 契约 (What)
/// - `bind`：地址形如 `host:port`，端口 0 表示由系统分配；
/// - `accept`：返回已记录对端地址的 [`TcpChannel`]，不做任何套接字调优，
///   调用方按用途决定是否调用 [`TcpChannel::tune_for_tunnel`]。
#[derive(Debug)]
pub struct TcpListener {
    inner: TokioTcpListener,
    local_addr: SocketAddr,
}

impl TcpListener {
    /// 绑定到指定地址并返回监听器。
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TokioTcpListener::bind(addr)
            .await
            .map_err(|err| TransportError::io(BIND, err))?;
        let local_addr = listener
            .local_addr()
            .map_err(|err| TransportError::io(BIND, err))?;
        Ok(Self {
            inner: listener,
            local_addr,
        })
    }

    /// 返回监听器实际绑定的地址。
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 接受一个入站连接。
    pub async fn accept(&self) -> Result<TcpChannel, TransportError> {
        let (stream, peer) = self
            .inner
            .accept()
            .await
            .map_err(|err| TransportError::io(ACCEPT, err))?;
        Ok(TcpChannel::from_parts(stream, peer))
    }
}
