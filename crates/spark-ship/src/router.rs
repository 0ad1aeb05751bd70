use spark_codec_tunnel::TunnelFrame;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{pending::PendingTable, tunnel_client::TunnelClient};

/// 单帧路由结果。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// 找到等待中的客户端，写回已在后台进行。
    Delivered,
    /// 没有对应的客户端，响应被丢弃。
    Orphaned,
}

/// 响应路由器：按请求 ID 把响应帧交还给对应的本地客户端。
///
/// 路由与请求发送顺序无关；每次写回在独立任务中进行，
/// 一个慢客户端不会拖住其他响应。
#[derive(Debug)]
pub struct ResponseRouter {
    tunnel: Arc<TunnelClient>,
    pending: Arc<PendingTable>,
}

impl ResponseRouter {
    /// 组装路由器。
    pub fn new(tunnel: Arc<TunnelClient>, pending: Arc<PendingTable>) -> Self {
        Self { tunnel, pending }
    }

    /// 消费隧道上收到的全部响应。
    pub async fn run(self) {
        while let Some(frame) = self.tunnel.next_response().await {
            self.route(frame);
        }
        debug!("response stream closed; router exiting");
    }

    /// 路由一帧响应。
    pub fn route(&self, frame: TunnelFrame) -> RouteOutcome {
        let (request_id, payload) = frame.into_parts();
        let Some(client) = self.pending.take(request_id) else {
            warn!(%request_id, bytes = payload.len(), "no pending client for response; dropping");
            return RouteOutcome::Orphaned;
        };
        tokio::spawn(async move {
            let peer = client.peer();
            match client.complete(&payload).await {
                Ok(()) => debug!(%request_id, %peer, bytes = payload.len(), "response delivered"),
                Err(err) => debug!(%request_id, %peer, error = %err, "client went away before delivery"),
            }
        });
        RouteOutcome::Delivered
    }
}
