use crate::{
    error::{CONNECT, TransportError},
    framed::{FrameReader, FrameWriter},
    util::tune_tunnel_socket,
};
use spark_codec_tunnel::TunnelCodec;
use std::net::SocketAddr;
use tokio::net::{
    TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// 单条 TCP 连接及其对端地址。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 隧道连接需要被拆成“唯一读者 + 加锁写者”，本地客户端连接则需要原样交给
///   HTTP 缓冲逻辑；两种用途都从这里出发。
///
/// ## 契约 (What)
/// - `connect`：建立到 `host:port` 的连接并完成隧道调优；
/// - `into_framed`：拆分为 [`FrameReader`] 与 [`FrameWriter`]，此后连接的生命周期由两者共同决定，
///   两者都被丢弃时连接关闭；
/// - `into_stream`：取回裸 `TcpStream`。
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
    peer_addr: SocketAddr,
}

impl TcpChannel {
    pub(crate) fn from_parts(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self { stream, peer_addr }
    }

    /// 建立到目标地址的隧道连接。
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| TransportError::io(CONNECT, err))?;
        let peer_addr = stream
            .peer_addr()
            .map_err(|err| TransportError::io(CONNECT, err))?;
        let channel = Self::from_parts(stream, peer_addr);
        channel.tune_for_tunnel()?;
        Ok(channel)
    }

    /// 对端地址。
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// 按隧道长连接的需求调优套接字。
    pub fn tune_for_tunnel(&self) -> Result<(), TransportError> {
        tune_tunnel_socket(&self.stream)
    }

    /// 拆分为帧读写两半。
    pub fn into_framed(
        self,
        codec: TunnelCodec,
    ) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
        let (read, write) = self.stream.into_split();
        (FrameReader::new(read, codec), FrameWriter::new(write, codec))
    }

    /// 取回裸 `TcpStream`。
    pub fn into_stream(self) -> TcpStream {
        self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TcpListener;
    use spark_codec_tunnel::{RequestId, TunnelFrame};

    #[tokio::test]
    async fn framed_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().to_string();

        let server = tokio::spawn(async move {
            let channel = listener.accept().await.expect("accept");
            channel.tune_for_tunnel().expect("tune");
            let (mut reader, writer) = channel.into_framed(TunnelCodec::new());
            let frame = reader.read_frame().await.expect("read").expect("frame");
            let (id, payload) = frame.into_parts();
            let mut echoed = payload.to_vec();
            echoed.reverse();
            writer
                .write_frame(&TunnelFrame::new(id, echoed))
                .await
                .expect("write");
        });

        let channel = TcpChannel::connect(&addr).await.expect("connect");
        let (mut reader, writer) = channel.into_framed(TunnelCodec::new());
        writer
            .write_frame(&TunnelFrame::new(RequestId::new(11), &b"abc"[..]))
            .await
            .expect("write");
        let reply = reader.read_frame().await.expect("read").expect("frame");
        assert_eq!(reply.request_id(), RequestId::new(11));
        assert_eq!(&reply.payload()[..], b"cba");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn connect_to_closed_port_is_retryable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().to_string();
        drop(listener);

        let err = TcpChannel::connect(&addr).await.expect_err("refused");
        assert_eq!(err.code(), "transport.tcp.connect_failed");
        assert!(err.is_retryable());
    }
}
