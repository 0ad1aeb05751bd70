//! 隧道帧编解码性质验证
//!
//! # 教案级注释概览
//! - **核心目标 (Why)**：读取端面对的是 TCP 字节流，任何一次读取都可能只拿到半个帧头或半段负载。
//!   这里验证“无论字节按什么粒度到达，解出的帧序列都与写入时一致”。
//! - **设计手法 (How)**：用 Proptest 随机生成帧序列与切片粒度，把编码结果按粒度逐段喂给增量解码器，
//!   每喂一段就尽可能多地取帧。
//! - **契约 (What)**：全部字节喂完后，解出的 `(request_id, payload)` 序列与原序列逐项相等，且缓冲为空。

use bytes::BytesMut;
use proptest::prelude::*;
use spark_codec_tunnel::{RequestId, TunnelCodec, TunnelFrame};

fn frames() -> impl Strategy<Value = Vec<(u64, Vec<u8>)>> {
    prop::collection::vec(
        (any::<u64>(), prop::collection::vec(any::<u8>(), 0..256)),
        1..16,
    )
}

proptest! {
    #[test]
    fn prop_chunked_stream_yields_original_frames(
        input in frames(),
        chunk in 1usize..40,
    ) {
        let codec = TunnelCodec::new();
        let mut wire = BytesMut::new();
        for (id, payload) in &input {
            codec
                .encode(&TunnelFrame::new(RequestId::new(*id), payload.clone()), &mut wire)
                .expect("encode");
        }

        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buffer.extend_from_slice(piece);
            while let Some(frame) = codec.decode(&mut buffer).expect("decode") {
                let (id, payload) = frame.into_parts();
                decoded.push((id.get(), payload.to_vec()));
            }
        }

        prop_assert!(codec.decode_eof(&mut buffer).expect("clean eof").is_none());
        prop_assert_eq!(decoded, input);
    }

    #[test]
    fn prop_cutting_the_stream_short_is_reported(
        payload in prop::collection::vec(any::<u8>(), 1..128),
        cut in 1usize..12,
    ) {
        let codec = TunnelCodec::new();
        let mut wire = BytesMut::new();
        codec
            .encode(&TunnelFrame::new(RequestId::new(42), payload), &mut wire)
            .expect("encode");
        let keep = wire.len() - cut.min(wire.len() - 1);
        let mut truncated = BytesMut::from(&wire[..keep]);
        prop_assert!(codec.decode_eof(&mut truncated).is_err());
    }
}
