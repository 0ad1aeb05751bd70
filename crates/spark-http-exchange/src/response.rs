//! 原始 HTTP/1.1 响应字节的序列化与合成。
//!
//! 隧道只搬运字节，因此无论是源站的真实响应还是任一环节合成的错误响应，
//! 最终都在这里变成 `HTTP/1.1 <code> <reason>\r\n` 开头的一整段缓冲。

use bytes::{BufMut, Bytes, BytesMut};
use std::error::Error as StdError;

/// 把状态行、头部与正文拼成一段响应字节。
///
/// 头部按给定顺序写出；调用方负责保证 `Content-Length` 与正文一致。
pub fn serialize<'a, I>(status: u16, reason: &str, headers: I, body: &[u8]) -> Bytes
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut out = BytesMut::with_capacity(128 + body.len());
    out.put_slice(format!("HTTP/1.1 {status} {reason}\r\n").as_bytes());
    for (name, value) in headers {
        out.put_slice(name.as_bytes());
        out.put_slice(b": ");
        out.put_slice(value);
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);
    out.freeze()
}

/// 合成一个纯文本错误响应。
///
/// 格式固定为 `Content-Type: text/plain` 加上与正文一致的 `Content-Length`。
pub fn synthesize(status: u16, reason: &str, message: &str) -> Bytes {
    let length = message.len().to_string();
    serialize(
        status,
        reason,
        [
            ("Content-Type", &b"text/plain"[..]),
            ("Content-Length", length.as_bytes()),
        ],
        message.as_bytes(),
    )
}

/// 源站不可达或读取失败。
pub fn bad_gateway(message: &str) -> Bytes {
    synthesize(502, "Bad Gateway", message)
}

/// 请求在本地即无法解析。
pub fn bad_request(message: &str) -> Bytes {
    synthesize(400, "Bad Request", message)
}

/// 隧道当前不可用。
pub fn service_unavailable(message: &str) -> Bytes {
    synthesize(503, "Service Unavailable", message)
}

/// 把错误及其来源链渲染为人类可读的描述，作为合成响应的正文。
pub fn failure_description(error: &(dyn StdError + 'static)) -> String {
    let mut description = format!("Error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !description.contains(&text) {
            description.push_str(": ");
            description.push_str(&text);
        }
        source = cause.source();
    }
    description
}
