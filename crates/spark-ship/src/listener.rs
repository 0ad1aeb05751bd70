//! # ClientListener：本地 HTTP 客户端入口
//!
//! ## 核心意图（Why）
//! - 每个本地连接只承载一个请求：完整缓冲之后交给准入器，之后连接进入挂起表等待响应；
//! - 缓冲在各自的任务中进行，慢客户端不会阻塞接受循环。
//!
//! ## 行为契约（What）
//! - 头部以 `CRLFCRLF` 结束；POST/PUT 且带 `Content-Length` 时继续读满正文，其余请求头部结束即完整；
//! - 缓冲阶段的任何故障（提前 EOF、超限、读错误）都只关闭该连接，不分配 ID，不登记条目；
//! - 超出声明长度的多余字节被截掉，隧道上只携带一个请求。

use bytes::{Bytes, BytesMut};
use spark_http_exchange::head;
use spark_transport_tcp::TcpListener;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::{admission::Admission, error::ShipError};

const READ_CHUNK: usize = 8 * 1024;

/// 从客户端读取并缓冲一个完整 HTTP 请求。
pub async fn buffer_request<R>(reader: &mut R, max_request_bytes: usize) -> Result<Bytes, ShipError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BytesMut::with_capacity(READ_CHUNK);
    let header_end = loop {
        if let Some(end) = head::find_header_end(&buffer) {
            break end;
        }
        if buffer.len() > max_request_bytes {
            return Err(ShipError::RequestTooLarge {
                limit: max_request_bytes,
            });
        }
        fill(reader, &mut buffer).await?;
    };

    let total = match head::declared_body_len(&buffer[..header_end]) {
        Some(body_len) => header_end.saturating_add(body_len),
        None => header_end,
    };
    if total > max_request_bytes {
        return Err(ShipError::RequestTooLarge {
            limit: max_request_bytes,
        });
    }
    while buffer.len() < total {
        fill(reader, &mut buffer).await?;
    }
    buffer.truncate(total);
    Ok(buffer.freeze())
}

async fn fill<R>(reader: &mut R, buffer: &mut BytesMut) -> Result<(), ShipError>
where
    R: AsyncRead + Unpin,
{
    buffer.reserve(READ_CHUNK);
    let read = reader
        .read_buf(buffer)
        .await
        .map_err(ShipError::ClientIo)?;
    if read == 0 {
        return Err(ShipError::ClientClosed {
            buffered: buffer.len(),
        });
    }
    Ok(())
}

/// 接受本地客户端连接的监听器。
#[derive(Debug)]
pub struct ClientListener {
    listener: TcpListener,
    admission: Arc<Admission>,
    max_request_bytes: usize,
}

impl ClientListener {
    /// 绑定本地监听地址。
    pub async fn bind(
        addr: &str,
        admission: Arc<Admission>,
        max_request_bytes: usize,
    ) -> Result<Self, ShipError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            admission,
            max_request_bytes,
        })
    }

    /// 实际绑定的地址。
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.listener.local_addr()
    }

    /// 接受循环：每个连接一个任务；接受失败记录后继续。
    pub async fn run(self) {
        info!(addr = %self.listener.local_addr(), "ship proxy listening for clients");
        loop {
            let channel = match self.listener.accept().await {
                Ok(channel) => channel,
                Err(err) => {
                    warn!(error = %err, code = err.code(), "failed to accept client connection");
                    continue;
                }
            };
            let admission = Arc::clone(&self.admission);
            let max_request_bytes = self.max_request_bytes;
            tokio::spawn(async move {
                let peer = channel.peer_addr();
                let mut stream = channel.into_stream();
                let raw = match buffer_request(&mut stream, max_request_bytes).await {
                    Ok(raw) => raw,
                    Err(err) => {
                        debug!(%peer, error = %err, code = err.code(), "dropping client before admission");
                        return;
                    }
                };
                let len = raw.len();
                match admission.admit(stream, peer, raw) {
                    Ok(request_id) => {
                        debug!(%peer, %request_id, bytes = len, "client request admitted");
                    }
                    Err(err) => {
                        warn!(%peer, error = %err, code = err.code(), "failed to admit client request");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, duplex};

    #[tokio::test]
    async fn get_is_complete_at_header_terminator() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .expect("write");
        let raw = buffer_request(&mut server, 1024).await.expect("request");
        assert_eq!(raw.as_ref(), b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n");
    }

    #[tokio::test]
    async fn post_body_is_read_across_chunks() {
        let (mut client, mut server) = duplex(64);
        let writer = tokio::spawn(async move {
            client
                .write_all(b"POST /p HTTP/1.1\r\ncontent-length: 10\r\n\r\n")
                .await
                .expect("head");
            tokio::task::yield_now().await;
            client.write_all(b"01234").await.expect("first half");
            tokio::task::yield_now().await;
            client.write_all(b"56789").await.expect("second half");
            client
        });
        let raw = buffer_request(&mut server, 1024).await.expect("request");
        assert!(raw.ends_with(b"\r\n\r\n0123456789"));
        writer.await.expect("writer");
    }

    #[tokio::test]
    async fn eof_before_body_completes_is_a_fault() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"PUT /p HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .expect("write");
        drop(client);
        let err = buffer_request(&mut server, 1024).await.expect_err("fault");
        assert_eq!(err.code(), "ship.client.closed_early");
    }

    #[tokio::test]
    async fn eof_before_header_end_is_a_fault() {
        let (mut client, mut server) = duplex(1024);
        client.write_all(b"GET / HTTP/1.1\r\n").await.expect("write");
        drop(client);
        let err = buffer_request(&mut server, 1024).await.expect_err("fault");
        assert_eq!(err.code(), "ship.client.closed_early");
    }

    #[tokio::test]
    async fn declared_body_over_limit_is_rejected() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"POST /p HTTP/1.1\r\nContent-Length: 4096\r\n\r\n")
            .await
            .expect("write");
        let err = buffer_request(&mut server, 128).await.expect_err("too large");
        assert_eq!(err.code(), "ship.client.request_too_large");
    }

    #[tokio::test]
    async fn get_ignores_content_length_and_trailing_bytes() {
        let (mut client, mut server) = duplex(1024);
        client
            .write_all(b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\nextra")
            .await
            .expect("write");
        let raw = buffer_request(&mut server, 1024).await.expect("request");
        assert!(raw.ends_with(b"\r\n\r\n"));
    }
}
