use thiserror::Error;

/// 执行器在发起出站调用之前就能判定的失败。
///
/// # 教案式说明
/// - **意图 (Why)**：把“请求本身不可用”与“源站出了问题”分开：前者由岸端转换为 4xx，
///   后者在执行器内部就被转换为 502，根本不会出现在这里；
/// - **契约 (What)**：除 `Client` 外的变体都保证没有产生任何网络流量。
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 第一行不符合 `METHOD target HTTP/x.y`。
    #[error("request line is not a recognizable `METHOD target HTTP/x.y`: `{line}`")]
    RequestLine {
        /// 原始请求行（有损 UTF-8）。
        line: String,
    },

    /// 相对目标缺少 Host 头，无法拼出绝对地址。
    #[error("relative target `{target}` has no Host header to resolve against")]
    MissingHost {
        /// 相对目标。
        target: String,
    },

    /// 拼出的绝对地址不合法。
    #[error("invalid outbound url `{url}`: {reason}")]
    InvalidUrl {
        /// 拼接结果。
        url: String,
        /// 解析失败原因。
        reason: String,
    },

    /// 构造 HTTP 客户端失败。
    #[error("failed to build outbound http client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ExchangeError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::RequestLine { .. } => "exchange.parse.request_line",
            ExchangeError::MissingHost { .. } => "exchange.parse.missing_host",
            ExchangeError::InvalidUrl { .. } => "exchange.parse.invalid_url",
            ExchangeError::Client(_) => "exchange.client.build",
        }
    }
}
