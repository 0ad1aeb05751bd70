use bytes::Bytes;
use core::fmt;
use reqwest::Url;

use crate::error::ExchangeError;
use crate::head::{find_header_end, head_text, header_fields, header_value};

/// 不转发给源站的逐跳字段。
pub const HOP_BY_HOP_HEADERS: [&str; 3] = ["Host", "Connection", "Proxy-Connection"];

/// 由出站客户端按实际正文重新生成的报文定界字段。
///
/// 非 POST/PUT 请求不转发正文，原样转发这些字段会让源站等待永远不会到达的字节。
pub const FRAMING_HEADERS: [&str; 2] = ["Content-Length", "Transfer-Encoding"];

/// 执行器认可的请求方法。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl Method {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => return None,
        })
    }

    /// 方法的线上表示。
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }

    /// 是否转发正文。
    pub fn carries_body(self) -> bool {
        matches!(self, Method::Post | Method::Put)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从原始请求字节解析出的出站调用描述。
///
/// # 教案式注释
/// - **意图 (Why)**：执行器只认这一份结构，解析规则集中在 [`OutboundRequest::parse`]，
///   便于单独测试；
/// - **解析规则 (How)**：
///   1. 第一行必须是 `METHOD target HTTP/d.d`，方法限定为 GET/POST/PUT/DELETE/HEAD/OPTIONS，
///      目标必须是 `http://`、`https://` 开头的绝对地址或 `/` 开头的路径；
///   2. 路径目标用 `Host` 头补全；协议按“整段请求中是否出现 `https://`（大小写不敏感）”推断，
///      否则为 `http`；
///   3. 除 [`HOP_BY_HOP_HEADERS`] 与 [`FRAMING_HEADERS`] 外的字段按原顺序保留；
///   4. POST/PUT 的正文取头部终止序列之后的全部字节。
/// - **契约 (What)**：解析失败返回 [`ExchangeError`]，此时不会产生任何网络流量。
/// - **风险 (Trade-offs)**：协议推断是启发式的，请求体或任意头部里出现 `https://`
///   都会把相对目标升级为 https，行为与既有部署保持一致。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundRequest {
    /// 请求方法。
    pub method: Method,
    /// 绝对目标地址。
    pub url: Url,
    /// 需要转发的头部字段。
    pub headers: Vec<(String, String)>,
    /// 正文（非 POST/PUT 时为空）。
    pub body: Bytes,
}

impl OutboundRequest {
    /// 解析原始请求字节。
    pub fn parse(raw: &[u8]) -> Result<Self, ExchangeError> {
        let head = head_text(raw);
        let request_line = head.split("\r\n").next().unwrap_or_default();
        let (method, target) =
            parse_request_line(request_line).ok_or_else(|| ExchangeError::RequestLine {
                line: request_line.to_owned(),
            })?;

        let url = resolve_target(target, &head, raw)?;

        let headers = header_fields(&head)
            .filter(|(name, _)| {
                !HOP_BY_HOP_HEADERS
                    .iter()
                    .chain(FRAMING_HEADERS.iter())
                    .any(|dropped| dropped.eq_ignore_ascii_case(name))
            })
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();

        let body = match find_header_end(raw) {
            Some(end) if method.carries_body() => Bytes::copy_from_slice(&raw[end..]),
            _ => Bytes::new(),
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }
}

fn parse_request_line(line: &str) -> Option<(Method, &str)> {
    let mut parts = line.split(' ');
    let method = Method::parse(parts.next()?)?;
    let target = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() || !is_http_version(version) {
        return None;
    }
    let absolute = target.starts_with("http://") || target.starts_with("https://");
    if !(absolute || target.starts_with('/')) {
        return None;
    }
    Some((method, target))
}

fn is_http_version(version: &str) -> bool {
    match version.strip_prefix("HTTP/").map(str::as_bytes) {
        Some([major, b'.', minor]) => major.is_ascii_digit() && minor.is_ascii_digit(),
        _ => false,
    }
}

fn resolve_target(target: &str, head: &str, raw: &[u8]) -> Result<Url, ExchangeError> {
    let absolute = if target.starts_with('/') {
        let host = header_value(head, "Host").ok_or_else(|| ExchangeError::MissingHost {
            target: target.to_owned(),
        })?;
        format!("{}://{host}{target}", infer_scheme(raw))
    } else {
        target.to_owned()
    };
    Url::parse(&absolute).map_err(|err| ExchangeError::InvalidUrl {
        url: absolute.clone(),
        reason: err.to_string(),
    })
}

fn infer_scheme(raw: &[u8]) -> &'static str {
    const NEEDLE: &[u8] = b"https://";
    let found = raw
        .windows(NEEDLE.len())
        .any(|window| window.eq_ignore_ascii_case(NEEDLE));
    if found { "https" } else { "http" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_target_resolves_against_host_as_http() {
        let raw = b"GET /path HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url.as_str(), "http://example.com/path");
        assert!(request.body.is_empty());
    }

    #[test]
    fn https_anywhere_in_request_upgrades_scheme() {
        let raw = b"GET /a?b=1 HTTP/1.1\r\nHost: example.com:8443\r\nReferer: HTTPS://origin.test/\r\n\r\n";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(request.url.as_str(), "https://example.com:8443/a?b=1");
    }

    #[test]
    fn absolute_target_is_used_verbatim() {
        let raw = b"DELETE http://api.test/items/3 HTTP/1.0\r\nHost: ignored.test\r\n\r\n";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.url.as_str(), "http://api.test/items/3");
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let raw = b"GET / HTTP/1.1\r\nHost: a.test\r\nConnection: keep-alive\r\nproxy-connection: keep-alive\r\nX-Trace: 7\r\nAccept: text/html\r\n\r\n";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(
            request.headers,
            vec![
                ("X-Trace".to_owned(), "7".to_owned()),
                ("Accept".to_owned(), "text/html".to_owned()),
            ]
        );
    }

    #[test]
    fn framing_headers_are_left_to_the_client() {
        let raw = b"DELETE /items/3 HTTP/1.1\r\nHost: a.test\r\nContent-Length: 4\r\ntransfer-encoding: chunked\r\nX-Trace: 7\r\n\r\n";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(request.headers, vec![("X-Trace".to_owned(), "7".to_owned())]);
        assert!(request.body.is_empty());

        let raw = b"POST /submit HTTP/1.1\r\nHost: a.test\r\nContent-Length: 2\r\n\r\nok";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert!(request.headers.is_empty());
        assert_eq!(&request.body[..], b"ok");
    }

    #[test]
    fn post_body_follows_terminator() {
        let raw = b"POST /submit HTTP/1.1\r\nHost: a.test\r\nContent-Length: 9\r\n\r\nname=luna";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert_eq!(request.method, Method::Post);
        assert_eq!(&request.body[..], b"name=luna");
    }

    #[test]
    fn get_never_forwards_trailing_bytes() {
        let raw = b"GET / HTTP/1.1\r\nHost: a.test\r\n\r\nleftover";
        let request = OutboundRequest::parse(raw).expect("parse");
        assert!(request.body.is_empty());
    }

    #[test]
    fn unrecognized_request_lines_are_rejected() {
        for raw in [
            &b"BREW /pot HTTP/1.1\r\nHost: a\r\n\r\n"[..],
            &b"GET pot HTTP/1.1\r\nHost: a\r\n\r\n"[..],
            &b"GET / SPDY/3\r\nHost: a\r\n\r\n"[..],
            &b"CONNECT a.test:443 HTTP/1.1\r\n\r\n"[..],
            &b"\r\n\r\n"[..],
            &b"garbage"[..],
        ] {
            let err = OutboundRequest::parse(raw).expect_err("must reject");
            assert_eq!(err.code(), "exchange.parse.request_line");
        }
    }

    #[test]
    fn relative_target_without_host_is_rejected() {
        let err = OutboundRequest::parse(b"GET /x HTTP/1.1\r\nAccept: */*\r\n\r\n")
            .expect_err("must reject");
        assert_eq!(err.code(), "exchange.parse.missing_host");
    }
}
