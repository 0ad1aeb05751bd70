use spark_http_exchange::response;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    admission::{QueuedRequest, RequestQueue},
    pending::PendingTable,
    tunnel_client::TunnelClient,
};

/// 请求分发器：分发队列的唯一消费者。
///
/// # 教案式说明
/// - **意图 (Why)**：队列按 ID 顺序出队，逐个写入隧道，隧道上的请求顺序因此与 ID 顺序一致；
/// - **契约 (What)**：写帧完成即处理下一个，不等待响应；发送失败时撤回挂起条目，
///   给客户端回写 503 并关闭连接，不重试；
/// - **注意 (Trade-offs)**：写帧成功只代表字节进入了内核缓冲，连接随后断开时该请求仍会丢失。
#[derive(Debug)]
pub struct RequestDispatcher {
    queue: RequestQueue,
    tunnel: Arc<TunnelClient>,
    pending: Arc<PendingTable>,
}

impl RequestDispatcher {
    /// 组装分发器。
    pub fn new(queue: RequestQueue, tunnel: Arc<TunnelClient>, pending: Arc<PendingTable>) -> Self {
        Self {
            queue,
            tunnel,
            pending,
        }
    }

    /// 消费队列直到所有准入器被释放。
    pub async fn run(mut self) {
        while let Some(request) = self.queue.recv().await {
            self.dispatch(request).await;
        }
        debug!("request queue closed; dispatcher exiting");
    }

    async fn dispatch(&self, request: QueuedRequest) {
        let QueuedRequest { request_id, raw } = request;
        let Err(err) = self.tunnel.send_request(request_id, raw).await else {
            return;
        };
        warn!(%request_id, error = %err, code = err.code(), "failed to dispatch request");
        let Some(client) = self.pending.take(request_id) else {
            return;
        };
        let reply = response::service_unavailable(&response::failure_description(&err));
        tokio::spawn(async move {
            let peer = client.peer();
            if let Err(err) = client.complete(&reply).await {
                debug!(%request_id, %peer, error = %err, "failed to deliver 503 to client");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{admission::Admission, pending::tests::loopback_pair};
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn disconnected_tunnel_yields_service_unavailable() {
        let pending = Arc::new(PendingTable::new());
        let (admission, queue) = Admission::new(Arc::clone(&pending));
        let tunnel = Arc::new(TunnelClient::new("127.0.0.1:9", Duration::from_secs(60)));
        let dispatcher = RequestDispatcher::new(queue, tunnel, Arc::clone(&pending));
        let handle = tokio::spawn(dispatcher.run());

        let (server, peer, mut client) = loopback_pair().await;
        admission
            .admit(server, peer, Bytes::from_static(b"GET / HTTP/1.1\r\n\r\n"))
            .expect("admit");

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.expect("read reply");
        let reply = String::from_utf8(reply).expect("utf8");
        assert!(reply.starts_with("HTTP/1.1 503 Service Unavailable\r\n"), "{reply}");
        assert!(reply.ends_with("Error: tunnel to offshore proxy is not connected"), "{reply}");
        assert!(pending.is_empty());

        drop(admission);
        handle.await.expect("dispatcher exits once the queue closes");
    }
}
