#![warn(missing_docs)]

//! `spark-codec-tunnel` 提供船端与岸端之间隧道的二进制分帧协议。
//!
//! # 教案背景（Why）
//! - 船端把大量并发的本地 HTTP 请求复用到**一条**长连接上，岸端需要在同一条字节流里
//!   区分出每一个请求，并把响应按请求 ID 回送；
//! - 因此每个单元都携带 64 位请求 ID 与 32 位长度前缀，两端共用同一份编解码实现，
//!   避免协议在两侧悄悄漂移。
//!
//! # 线格式（What）
//! ```text
//! +--------------------+----------------+---------------------+
//! | request_id (u64 BE) | length (u32 BE) | payload (length B) |
//! +--------------------+----------------+---------------------+
//!        8 bytes             4 bytes          variable
//! ```
//! - 无版本号、无校验和，帧边界仅由长度前缀决定；
//! - 读取端必须容忍任意的部分读取：[`TunnelCodec::decode`] 在数据不足时返回 `Ok(None)`；
//! - 任何一段在流结束前被截断，都视为该方向连接的致命断开（见 [`CodecError::Truncated`]）。
//!
//! # 使用概览（How）
//! - 写入端调用 [`TunnelCodec::encode`] 或 [`encode_header`] 生成字节；
//! - 读取端把套接字读到的字节追加进 `BytesMut`，循环调用 [`TunnelCodec::decode`]。
//!
//! # 风险提示（Trade-offs）
//! - 协议没有魔数，错位读取无法自检；长度上限 [`DEFAULT_MAX_PAYLOAD_LEN`] 是唯一的防线，
//!   用于阻止损坏的长度字段触发巨量分配。

mod codec;
mod error;
mod frame;

pub use crate::codec::{DEFAULT_MAX_PAYLOAD_LEN, HEADER_LEN, TunnelCodec, encode_header};
pub use crate::error::CodecError;
pub use crate::frame::{RequestId, TunnelFrame};
