use thiserror::Error;

/// 隧道编解码错误。
///
/// # 教案式说明
/// - **意图 (Why)**：区分“帧本身不合法”与“流在帧中间结束”，前者提示对端实现错误，
///   后者是传输故障，由船端的重连循环恢复；
/// - **契约 (What)**：每个变体都有稳定错误码（[`CodecError::code`]），日志与告警按错误码聚合。
#[derive(Debug, Error)]
pub enum CodecError {
    /// 负载长度超出允许上限（含 u32 长度字段的物理上限）。
    #[error("tunnel frame payload of {len} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge {
        /// 声明或实际的负载长度。
        len: usize,
        /// 生效的上限。
        limit: usize,
    },

    /// 流在一帧中途结束。
    #[error("tunnel stream ended mid-frame: needed {needed} bytes, only {available} available")]
    Truncated {
        /// 补齐当前帧所需的字节数。
        needed: usize,
        /// 实际已缓冲的字节数。
        available: usize,
    },
}

impl CodecError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            CodecError::FrameTooLarge { .. } => "tunnel.codec.frame_too_large",
            CodecError::Truncated { .. } => "tunnel.codec.truncated",
        }
    }
}
