use spark_codec_tunnel::CodecError;
use std::io;
use thiserror::Error;

/// 描述一次底层操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OperationKind {
    /// 稳定错误码。
    pub code: &'static str,
    /// 日志文案。
    pub message: &'static str,
}

pub(crate) const BIND: OperationKind = OperationKind {
    code: "transport.tcp.bind_failed",
    message: "tcp bind",
};
pub(crate) const ACCEPT: OperationKind = OperationKind {
    code: "transport.tcp.accept_failed",
    message: "tcp accept",
};
pub(crate) const CONNECT: OperationKind = OperationKind {
    code: "transport.tcp.connect_failed",
    message: "tcp connect",
};
pub(crate) const READ: OperationKind = OperationKind {
    code: "transport.tcp.read_failed",
    message: "tcp read",
};
pub(crate) const WRITE: OperationKind = OperationKind {
    code: "transport.tcp.write_failed",
    message: "tcp write",
};
pub(crate) const SHUTDOWN: OperationKind = OperationKind {
    code: "transport.tcp.shutdown_failed",
    message: "tcp shutdown",
};
pub(crate) const CONFIGURE: OperationKind = OperationKind {
    code: "transport.tcp.configure_failed",
    message: "tcp configure",
};

/// 传输层错误。
///
/// # 教案式说明
/// - **意图 (Why)**：让隧道客户端只凭错误本身就能决定“重连”还是“放弃”，
///   不必解析字符串；
/// - **契约 (What)**：`Io` 携带失败的操作类型；`Codec` 表示线上的字节不再可信
///   （截断或超限），一律视为连接级致命错误。
#[derive(Debug, Error)]
pub enum TransportError {
    /// 底层 IO 失败。
    #[error("{op}: {source}", op = .kind.message)]
    Io {
        /// 失败的操作。
        kind: OperationKind,
        /// 原始 IO 错误。
        #[source]
        source: io::Error,
    },

    /// 帧层面的错误。
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl TransportError {
    pub(crate) fn io(kind: OperationKind, source: io::Error) -> Self {
        TransportError::Io { kind, source }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            TransportError::Io { kind, .. } => kind.code,
            TransportError::Codec(err) => err.code(),
        }
    }

    /// 失败是否可能在重试（通常是重新建连）后消失。
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Io { source, .. } => is_retryable_io(source),
            TransportError::Codec(_) => false,
        }
    }
}

fn is_retryable_io(error: &io::Error) -> bool {
    use io::ErrorKind;
    matches!(
        error.kind(),
        ErrorKind::TimedOut
            | ErrorKind::WouldBlock
            | ErrorKind::Interrupted
            | ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::AddrInUse
            | ErrorKind::AddrNotAvailable
            | ErrorKind::BrokenPipe
            | ErrorKind::WriteZero
            | ErrorKind::UnexpectedEof
    )
}
