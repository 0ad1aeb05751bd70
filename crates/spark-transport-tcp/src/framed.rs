use crate::error::{READ, SHUTDOWN, TransportError, WRITE};
use bytes::BytesMut;
use spark_codec_tunnel::{TunnelCodec, TunnelFrame, encode_header};
use std::sync::Arc;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::Mutex as AsyncMutex,
};

const READ_CHUNK: usize = 8 * 1024;

/// 独占某个方向读半部的帧读取器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 每条隧道连接、每个方向只有一个读者，因此读路径不加锁；
/// - 解码状态保存在内部缓冲中，`read_frame` 可以安全地放进 `tokio::select!`：
///   被取消时已读到的字节不会丢失。
///
/// ## 契约 (What)
/// - `Ok(Some(frame))`：读到完整帧；
/// - `Ok(None)`：对端在帧边界处正常关闭；
/// - `Err(..)`：IO 失败或流在帧中途结束，连接应被视为已断开。
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    buffer: BytesMut,
    codec: TunnelCodec,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// 包装读半部。
    pub fn new(inner: R, codec: TunnelCodec) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(READ_CHUNK),
            codec,
        }
    }

    /// 读取下一帧。
    pub async fn read_frame(&mut self) -> Result<Option<TunnelFrame>, TransportError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.buffer)? {
                return Ok(Some(frame));
            }
            if self.buffer.capacity() - self.buffer.len() < READ_CHUNK {
                self.buffer.reserve(READ_CHUNK);
            }
            let read = self
                .inner
                .read_buf(&mut self.buffer)
                .await
                .map_err(|err| TransportError::io(READ, err))?;
            if read == 0 {
                return Ok(self.codec.decode_eof(&mut self.buffer)?);
            }
        }
    }
}

/// 共享写锁的帧写入器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 岸端多个 worker 可能同时完成 HTTP 调用，船端也可能有多个发送者；
///   所有写者必须串行化，否则一帧的负载会被另一帧的字节截断；
/// - 把“写锁”做成类型本身的属性：克隆出来的句柄共享同一把锁，调用方无法绕过。
///
/// ## 逻辑 (How)
/// - 在锁内依次写帧头、负载并 flush，锁只在一帧期间持有；
/// - 负载长度在取锁前校验，超限的帧不会占用连接。
///
/// ## 注意事项 (Trade-offs)
/// - 若在写入途中失败（或写入 Future 被取消），线上可能残留半帧，
///   该连接必须整体丢弃。
#[derive(Debug)]
pub struct FrameWriter<W> {
    inner: Arc<AsyncMutex<W>>,
    codec: TunnelCodec,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            codec: self.codec,
        }
    }
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// 包装写半部。
    pub fn new(inner: W, codec: TunnelCodec) -> Self {
        Self {
            inner: Arc::new(AsyncMutex::new(inner)),
            codec,
        }
    }

    /// 原子地写出一整帧。
    pub async fn write_frame(&self, frame: &TunnelFrame) -> Result<(), TransportError> {
        let len = self.codec.checked_len(frame.payload().len())?;
        let header = encode_header(frame.request_id(), len);

        let mut guard = self.inner.lock().await;
        guard
            .write_all(&header)
            .await
            .map_err(|err| TransportError::io(WRITE, err))?;
        guard
            .write_all(frame.payload())
            .await
            .map_err(|err| TransportError::io(WRITE, err))?;
        guard
            .flush()
            .await
            .map_err(|err| TransportError::io(WRITE, err))
    }

    /// 关闭写方向，对端读者随后会看到 EOF。
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        let mut guard = self.inner.lock().await;
        guard
            .shutdown()
            .await
            .map_err(|err| TransportError::io(SHUTDOWN, err))
    }
}
