use bytes::{Buf, BufMut, BytesMut};

use crate::error::CodecError;
use crate::frame::{RequestId, TunnelFrame};

/// 帧头长度：`request_id`(8) + `length`(4)。
pub const HEADER_LEN: usize = 12;

/// 默认负载上限：64 MiB。
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024 * 1024;

const WIRE_MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// 生成帧头字节。
///
/// 写入端在持有连接写锁时先写帧头、再写负载，避免把负载复制进中间缓冲。
pub fn encode_header(request_id: RequestId, payload_len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[..8].copy_from_slice(&request_id.get().to_be_bytes());
    header[8..].copy_from_slice(&payload_len.to_be_bytes());
    header
}

/// 长度前缀帧编解码器。
///
/// # 设计动机（Why）
/// - 两端共享同一份实现，线格式只在此处定义；
/// - 解码是增量式的：调用方可以把任意长度的读取结果追加进缓冲后反复调用，
///   这样“短读”不再是特殊情况。
///
/// # 契约说明（What）
/// - `encode`：把完整帧追加到 `dst`；负载超限返回 [`CodecError::FrameTooLarge`]；
/// - `decode`：缓冲中有完整帧时消费并返回，否则返回 `Ok(None)` 且不消费任何字节；
/// - `decode_eof`：流结束时调用，残留半帧返回 [`CodecError::Truncated`]。
///
/// # 权衡与风险（Trade-offs）
/// - 长度字段在帧头到齐后立即校验，不等负载到齐，防止损坏的长度撑爆缓冲。
#[derive(Clone, Copy, Debug)]
pub struct TunnelCodec {
    max_payload_len: usize,
}

impl TunnelCodec {
    /// 使用默认上限构造。
    pub fn new() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
        }
    }

    /// 指定负载上限，超过 u32 表示范围的部分会被截到线格式上限。
    pub fn with_max_payload_len(max_payload_len: usize) -> Self {
        Self {
            max_payload_len: max_payload_len.min(WIRE_MAX_PAYLOAD_LEN),
        }
    }

    /// 当前生效的负载上限。
    pub fn max_payload_len(&self) -> usize {
        self.max_payload_len
    }

    /// 校验负载长度并返回线上的 u32 表示。
    pub fn checked_len(&self, len: usize) -> Result<u32, CodecError> {
        if len > self.max_payload_len {
            return Err(CodecError::FrameTooLarge {
                len,
                limit: self.max_payload_len,
            });
        }
        u32::try_from(len).map_err(|_| CodecError::FrameTooLarge {
            len,
            limit: WIRE_MAX_PAYLOAD_LEN,
        })
    }

    /// 把整帧编码到 `dst` 末尾。
    pub fn encode(&self, frame: &TunnelFrame, dst: &mut BytesMut) -> Result<(), CodecError> {
        let len = self.checked_len(frame.payload().len())?;
        dst.reserve(frame.encoded_len());
        dst.put_slice(&encode_header(frame.request_id(), len));
        dst.put_slice(frame.payload());
        Ok(())
    }

    /// 尝试从 `src` 头部解出一帧。
    pub fn decode(&self, src: &mut BytesMut) -> Result<Option<TunnelFrame>, CodecError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let mut header = &src[..HEADER_LEN];
        let request_id = RequestId::new(header.get_u64());
        let len = header.get_u32() as usize;
        if len > self.max_payload_len {
            return Err(CodecError::FrameTooLarge {
                len,
                limit: self.max_payload_len,
            });
        }

        let total = HEADER_LEN + len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(TunnelFrame::new(request_id, payload)))
    }

    /// 流已结束时的解码：完整帧照常返回，残留半帧视为截断。
    pub fn decode_eof(&self, src: &mut BytesMut) -> Result<Option<TunnelFrame>, CodecError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                let needed = if src.len() < HEADER_LEN {
                    HEADER_LEN
                } else {
                    let mut header = &src[8..HEADER_LEN];
                    HEADER_LEN + header.get_u32() as usize
                };
                Err(CodecError::Truncated {
                    needed,
                    available: src.len(),
                })
            }
        }
    }
}

impl Default for TunnelCodec {
    fn default() -> Self {
        Self::new()
    }
}
