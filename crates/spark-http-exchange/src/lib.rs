//! # spark-http-exchange
//!
//! ## 定位与职责（Why）
//! - 岸端收到的每个隧道帧都是船端原样缓冲下来的一段 HTTP/1.x 请求字节；本 crate 把这段字节
//!   变成一次真实的出站 HTTP 调用，再把结果序列化回原始响应字节；
//! - [`HttpExchange`] 是唯一的替换点：岸端服务器只依赖该 trait，测试可以注入脚本化实现。
//!
//! ## 模块划分（Where）
//! - `head`：请求头部的轻量解析工具，船端监听器也用它判断请求是否已缓冲完整；
//! - `request`：请求行/Host/头部/正文的解析与目标 URL 推断；
//! - `response`：响应序列化与合成错误响应；
//! - `executor`：基于 `reqwest` 的默认执行器；
//! - `error`：本地解析错误。
//!
//! ## 错误策略（Trade-offs）
//! - 源站不可达、读取失败等出站故障不会越过执行器边界，一律转换为 `502 Bad Gateway`；
//! - 只有在发起任何出站调用之前就能判定的本地解析失败才以 [`ExchangeError`] 返回，
//!   由调用方决定如何合成客户端错误响应。

mod error;
mod executor;
pub mod head;
mod request;
pub mod response;

pub use error::ExchangeError;
pub use executor::{ExchangeConfig, HttpExchange, ReqwestExchange};
pub use request::{FRAMING_HEADERS, HOP_BY_HOP_HEADERS, Method, OutboundRequest};
