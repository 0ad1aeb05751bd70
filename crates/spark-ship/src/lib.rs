#![doc = r#"
# spark-ship

## 设计动机（Why）
- 船上只有一条不稳定的出海链路；本地 HTTP 客户端各自建立的连接被收拢到一条隧道上，
  按请求 ID 流水线发送、乱序返回；
- 链路断开时隧道客户端无限重连，本地监听器照常接受新请求。

## 组件关系（How）
```text
ClientListener ──buffer──▶ Admission ──queue──▶ RequestDispatcher ──frame──▶ TunnelClient
       │                      │                                              │
       │                      └──insert──▶ PendingTable ◀──take── ResponseRouter ◀──frames
       └── 每个连接一个任务
```
- [`Admission`] 在一把锁内完成 ID 分配、挂起登记与入队；
- [`RequestDispatcher`] 是队列唯一消费者，隧道上的请求顺序即 ID 顺序；
- [`ResponseRouter`] 按 ID 把响应交还给客户端，顺序无关。

## 契约（What）
- 每个本地连接只承载一个请求，响应写回后连接关闭；
- 隧道未连接时请求收到 `503 Service Unavailable`；
- 断开时在途的请求不会重发。
"#]

mod admission;
mod config;
mod dispatcher;
mod error;
mod listener;
mod pending;
mod router;
mod tunnel_client;

pub use admission::{Admission, QueuedRequest, RequestQueue};
pub use config::ShipConfig;
pub use dispatcher::RequestDispatcher;
pub use error::ShipError;
pub use listener::{ClientListener, buffer_request};
pub use pending::{PendingClientConnection, PendingTable};
pub use router::{ResponseRouter, RouteOutcome};
pub use tunnel_client::{TunnelClient, TunnelConnectionState};

use std::{net::SocketAddr, sync::Arc};
use tracing::info;

/// 组装完成、尚未运行的船端代理。
///
/// `bind` 只绑定本地监听地址；`run` 才启动隧道与各个循环。
#[derive(Debug)]
pub struct ShipProxy {
    listener: ClientListener,
    dispatcher: RequestDispatcher,
    router: ResponseRouter,
    tunnel: Arc<TunnelClient>,
    pending: Arc<PendingTable>,
}

impl ShipProxy {
    /// 按配置组装全部组件并绑定本地监听地址。
    pub async fn bind(config: &ShipConfig) -> Result<Self, ShipError> {
        let pending = Arc::new(PendingTable::new());
        let tunnel = Arc::new(TunnelClient::new(
            config.offshore_addr(),
            config.reconnect_interval(),
        ));
        let (admission, queue) = Admission::new(Arc::clone(&pending));
        let listener = ClientListener::bind(
            &config.listen_addr,
            Arc::new(admission),
            config.max_request_bytes,
        )
        .await?;
        Ok(Self {
            listener,
            dispatcher: RequestDispatcher::new(queue, Arc::clone(&tunnel), Arc::clone(&pending)),
            router: ResponseRouter::new(Arc::clone(&tunnel), Arc::clone(&pending)),
            tunnel,
            pending,
        })
    }

    /// 本地监听器实际绑定的地址。
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// 隧道客户端句柄，可用于观测连接状态。
    pub fn tunnel(&self) -> Arc<TunnelClient> {
        Arc::clone(&self.tunnel)
    }

    /// 挂起表句柄。
    pub fn pending(&self) -> Arc<PendingTable> {
        Arc::clone(&self.pending)
    }

    /// 启动隧道、分发器与路由器，然后运行接受循环。
    ///
    /// 正常情况下不会返回；调用方通过取消该 Future 停止代理。
    pub async fn run(self) {
        let Self {
            listener,
            dispatcher,
            router,
            tunnel,
            ..
        } = self;
        info!(addr = %listener.local_addr(), "starting ship proxy");
        let supervisor = tunnel.connect();
        let dispatcher = tokio::spawn(dispatcher.run());
        let router = tokio::spawn(router.run());

        let _guard = AbortOnDrop(
            [supervisor, Some(dispatcher), Some(router)]
                .into_iter()
                .flatten()
                .collect(),
        );
        listener.run().await;
    }
}

struct AbortOnDrop(Vec<tokio::task::JoinHandle<()>>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}
