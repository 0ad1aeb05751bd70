use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client,
    header::{CONTENT_LENGTH, HeaderName, HeaderValue, TRANSFER_ENCODING},
};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ExchangeError;
use crate::request::OutboundRequest;
use crate::response;

/// 原始字节进、原始字节出的 HTTP 执行契约。
///
/// # 教案式注释
/// - **意图 (Why)**：岸端服务器只依赖这一 trait，出站 HTTP 客户端可以整体替换；
/// - **契约 (What)**：
///   - `Ok(bytes)`：完整的 HTTP/1.1 响应字节，既可能来自源站，也可能是合成的 502；
///   - `Err(..)`：请求在本地就无法解析，尚未发起任何出站调用；
///   - 每次调用相互独立，实现必须可在多个任务间共享。
#[async_trait]
pub trait HttpExchange: Send + Sync {
    /// 执行一次出站调用。
    async fn execute(&self, raw_request: Bytes) -> Result<Bytes, ExchangeError>;
}

/// 出站客户端的可选限制；缺省即不设任何截止时间。
#[derive(Clone, Debug, Default)]
pub struct ExchangeConfig {
    /// 建连超时。
    pub connect_timeout: Option<Duration>,
    /// 整个请求（含读取正文）的超时。
    pub request_timeout: Option<Duration>,
}

/// 基于 `reqwest` 的默认执行器。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// 1. [`OutboundRequest::parse`] 得到方法、绝对地址、待转发头部与正文；
/// 2. 逐个复制头部，名称或取值不合法的字段跳过并记录；
/// 3. 发送请求并读取完整正文；任何一步失败都合成 `502 Bad Gateway`，正文为失败描述；
/// 4. 序列化状态行、源站头部与正文。
///
/// ## 注意事项 (Trade-offs)
/// - `reqwest` 交付的是已解除分块的正文，因此丢弃源站的 `Transfer-Encoding`，
///   并在源站未给出 `Content-Length` 时补上实际长度，保证回给客户端的字节自洽；
/// - 4xx/5xx 的正文与成功响应一样原样返回。
#[derive(Clone, Debug)]
pub struct ReqwestExchange {
    client: Client,
}

impl ReqwestExchange {
    /// 按配置构造执行器。
    pub fn new(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ExchangeError::Client)?;
        Ok(Self { client })
    }

    async fn forward(&self, request: OutboundRequest) -> Result<Bytes, reqwest::Error> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => builder = builder.header(name, value),
                _ => debug!(header = %name, "skipping header that cannot be forwarded"),
            }
        }
        if request.method.carries_body() && !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let upstream = builder.send().await?;
        let status = upstream.status();
        let headers = upstream.headers().clone();
        let body = upstream.bytes().await?;
        info!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            len = body.len(),
            "upstream exchange completed"
        );

        let length = body.len().to_string();
        let mut fields: Vec<(&str, &[u8])> = headers
            .iter()
            .filter(|(name, _)| **name != TRANSFER_ENCODING)
            .map(|(name, value)| (name.as_str(), value.as_bytes()))
            .collect();
        if !headers.contains_key(CONTENT_LENGTH) {
            fields.push((CONTENT_LENGTH.as_str(), length.as_bytes()));
        }
        Ok(response::serialize(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            fields,
            &body,
        ))
    }
}

#[async_trait]
impl HttpExchange for ReqwestExchange {
    async fn execute(&self, raw_request: Bytes) -> Result<Bytes, ExchangeError> {
        let request = OutboundRequest::parse(&raw_request)?;
        let method = request.method;
        let url = request.url.clone();
        debug!(%method, %url, "executing outbound request");

        match self.forward(request).await {
            Ok(raw) => Ok(raw),
            Err(err) => {
                let description = response::failure_description(&err);
                warn!(%method, %url, error = %description, "upstream exchange failed");
                Ok(response::bad_gateway(&description))
            }
        }
    }
}
