use bytes::Bytes;
use core::fmt;

/// 隧道上唯一的关联键。
///
/// # 教案式说明
/// - **意图 (Why)**：请求与响应之间只靠它对应，顺序不参与关联；
/// - **契约 (What)**：由船端从 1 开始单调分配，在一个隧道客户端实例的生命周期内不复用；
///   本类型只负责承载数值，分配策略由船端的准入器负责。
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// 第一个可分配的请求 ID。
    pub const FIRST: RequestId = RequestId(1);

    /// 以原始数值构造。
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// 返回原始数值。
    pub const fn get(self) -> u64 {
        self.0
    }

    /// 返回紧随其后的 ID。
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 隧道两个方向上的传输单元：`(request_id, payload)`。
///
/// # 教案式说明
/// - **意图 (Why)**：把“哪个请求”与“哪些字节”绑定为一个不可拆分的整体，
///   写入端一次写完整帧，读取端一次交付整帧；
/// - **契约 (What)**：长度字段不单独存储，编码时总是取 `payload.len()`，
///   因此“长度等于负载长度”的不变量由构造方式保证；
/// - **权衡 (Trade-offs)**：负载使用 [`Bytes`]，在分发、重试日志与回写之间克隆只增加引用计数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunnelFrame {
    request_id: RequestId,
    payload: Bytes,
}

impl TunnelFrame {
    /// 以请求 ID 与负载构造帧。
    pub fn new(request_id: RequestId, payload: impl Into<Bytes>) -> Self {
        Self {
            request_id,
            payload: payload.into(),
        }
    }

    /// 帧关联的请求 ID。
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// 帧负载。
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// 编码后在线上占用的总字节数。
    pub fn encoded_len(&self) -> usize {
        crate::HEADER_LEN + self.payload.len()
    }

    /// 拆解为 `(request_id, payload)`。
    pub fn into_parts(self) -> (RequestId, Bytes) {
        (self.request_id, self.payload)
    }
}
