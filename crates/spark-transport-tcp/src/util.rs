use crate::error::{CONFIGURE, TransportError};
use socket2::{SockRef, TcpKeepalive};
use std::time::Duration;
use tokio::net::TcpStream;

const TUNNEL_KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

/// 为隧道长连接设置 `TCP_NODELAY` 与 keepalive。
///
/// 隧道上的帧通常很小且需要立即送达；keepalive 让静默断开的链路最终暴露为读错误，
/// 从而触发重连。
pub fn tune_tunnel_socket(stream: &TcpStream) -> Result<(), TransportError> {
    stream
        .set_nodelay(true)
        .map_err(|err| TransportError::io(CONFIGURE, err))?;
    let keepalive = TcpKeepalive::new().with_time(TUNNEL_KEEPALIVE_IDLE);
    SockRef::from(stream)
        .set_tcp_keepalive(&keepalive)
        .map_err(|err| TransportError::io(CONFIGURE, err))
}
