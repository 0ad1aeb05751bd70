//! HTTP/1.x 请求头部的轻量解析工具。
//!
//! 这里只做隧道需要的最少判断：头部在哪里结束、请求是否携带正文、正文有多长。
//! 完整的 HTTP 语义交给出站客户端。

use std::borrow::Cow;

/// 头部终止序列。
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// 返回头部终止序列之后第一个字节的下标。
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}

/// 以有损 UTF-8 视图返回头部文本（不含终止序列）；没有终止序列时返回整段输入。
pub fn head_text(buf: &[u8]) -> Cow<'_, str> {
    let end = find_header_end(buf)
        .map(|end| end - HEADER_TERMINATOR.len())
        .unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end])
}

/// 逐个返回头部字段 `(name, value)`，跳过请求行，遇到空行停止。
///
/// 没有冒号或冒号位于行首的行会被忽略。
pub fn header_fields(head: &str) -> impl Iterator<Item = (&str, &str)> {
    head.split("\r\n")
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| match line.find(':') {
            Some(colon) if colon > 0 => Some((line[..colon].trim(), line[colon + 1..].trim())),
            _ => None,
        })
}

/// 按名称（大小写不敏感）查找第一个匹配字段的值。
pub fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    header_fields(head)
        .find(|(field, _)| field.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// 该方法的请求是否按 `Content-Length` 携带正文。
pub fn method_carries_body(method: &str) -> bool {
    method == "POST" || method == "PUT"
}

/// 已缓冲头部声明的正文长度。
///
/// 仅当方法为 POST/PUT 且存在可解析的 `Content-Length` 时返回 `Some`；
/// 其余请求在头部终止序列处即视为完整。
pub fn declared_body_len(buf: &[u8]) -> Option<usize> {
    let head = head_text(buf);
    let method = head.split(' ').next().unwrap_or_default();
    if !method_carries_body(method) {
        return None;
    }
    header_value(&head, "Content-Length").and_then(|value| value.parse().ok())
}
