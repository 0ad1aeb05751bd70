//! 船端代理端到端测试：以脚本化的假岸端验证关联、乱序与重连。
//!
//! # 测试目标（Why）
//! - 并发客户端获得互不相同、从 1 开始的请求 ID，且各自收到自己的响应；
//! - 岸端乱序返回时响应仍回到正确客户端；
//! - 隧道断开后自动重连，新请求可以继续通过；
//! - 隧道不可用时客户端收到 503。

use spark_codec_tunnel::{TunnelCodec, TunnelFrame};
use spark_ship::{ShipConfig, ShipProxy, TunnelConnectionState};
use spark_transport_tcp::{FrameReader, FrameWriter, TcpListener};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    time::timeout,
};

const WAIT: Duration = Duration::from_secs(10);

async fn start_ship(offshore: SocketAddr) -> ShipProxyHandle {
    let config = ShipConfig {
        listen_addr: "127.0.0.1:0".to_owned(),
        offshore_host: offshore.ip().to_string(),
        offshore_port: offshore.port(),
        reconnect_interval_ms: 50,
        ..ShipConfig::default()
    };
    let proxy = ShipProxy::bind(&config).await.expect("bind ship proxy");
    let addr = proxy.local_addr();
    let tunnel = proxy.tunnel();
    let pending = proxy.pending();
    let task = tokio::spawn(proxy.run());
    ShipProxyHandle {
        addr,
        tunnel,
        pending,
        task,
    }
}

struct ShipProxyHandle {
    addr: SocketAddr,
    tunnel: std::sync::Arc<spark_ship::TunnelClient>,
    pending: std::sync::Arc<spark_ship::PendingTable>,
    task: tokio::task::JoinHandle<()>,
}

impl Drop for ShipProxyHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_tunnel(
    listener: &TcpListener,
) -> (FrameReader<OwnedReadHalf>, FrameWriter<OwnedWriteHalf>) {
    let channel = timeout(WAIT, listener.accept())
        .await
        .expect("ship connects in time")
        .expect("accept tunnel");
    channel.into_framed(TunnelCodec::new())
}

/// 等到指定代号的连接进入 `Connected`；之前发出的请求会被快速拒绝。
async fn wait_connected(ship: &ShipProxyHandle, generation: u64) {
    let mut states = ship.tunnel.subscribe_state();
    timeout(WAIT, async {
        loop {
            if ship.tunnel.connection_generation() >= generation
                && *states.borrow_and_update() == TunnelConnectionState::Connected
            {
                return;
            }
            let _ = timeout(Duration::from_millis(10), states.changed()).await;
        }
    })
    .await
    .expect("tunnel connected in time");
}

async fn send_client_request(addr: SocketAddr, raw: &str) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect to ship");
    stream.write_all(raw.as_bytes()).await.expect("send request");
    stream
}

async fn read_reply(mut stream: TcpStream) -> String {
    let mut reply = Vec::new();
    timeout(WAIT, stream.read_to_end(&mut reply))
        .await
        .expect("reply in time")
        .expect("read reply");
    String::from_utf8(reply).expect("utf8 reply")
}

fn echo_response(path: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{path}",
        path.len()
    )
}

fn request_path(frame: &TunnelFrame) -> String {
    let text = String::from_utf8_lossy(frame.payload());
    text.split(' ').nth(1).unwrap_or_default().to_owned()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_clients_get_distinct_ids_and_their_own_responses() {
    let offshore = TcpListener::bind("127.0.0.1:0").await.expect("bind offshore");
    let ship = start_ship(offshore.local_addr()).await;
    let (mut reader, writer) = accept_tunnel(&offshore).await;
    wait_connected(&ship, 1).await;

    const CLIENTS: usize = 16;
    let mut clients = Vec::new();
    for index in 0..CLIENTS {
        let raw = format!("GET http://origin.test/item/{index} HTTP/1.1\r\nHost: origin.test\r\n\r\n");
        let stream = send_client_request(ship.addr, &raw).await;
        clients.push(tokio::spawn(read_reply(stream)));
    }

    let mut frames = Vec::new();
    for _ in 0..CLIENTS {
        let frame = timeout(WAIT, reader.read_frame())
            .await
            .expect("frame in time")
            .expect("read frame")
            .expect("tunnel open");
        frames.push(frame);
    }
    let ids: Vec<u64> = frames.iter().map(|frame| frame.request_id().get()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (1..=CLIENTS as u64).collect::<Vec<_>>());
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]), "tunnel order follows id order: {ids:?}");

    // 反序回复，验证关联与顺序无关。
    for frame in frames.iter().rev() {
        let response = echo_response(&request_path(frame));
        writer
            .write_frame(&TunnelFrame::new(frame.request_id(), response.into_bytes()))
            .await
            .expect("write response");
    }

    for (index, client) in clients.into_iter().enumerate() {
        let reply = client.await.expect("client task");
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"), "{reply}");
        assert!(reply.ends_with(&format!("/item/{index}")), "client {index} got {reply}");
    }
    assert_eq!(ship.tunnel.state(), TunnelConnectionState::Connected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reconnects_after_offshore_drops_the_tunnel() {
    let offshore = TcpListener::bind("127.0.0.1:0").await.expect("bind offshore");
    let ship = start_ship(offshore.local_addr()).await;

    let (mut reader, writer) = accept_tunnel(&offshore).await;
    wait_connected(&ship, 1).await;
    let lost_client = send_client_request(
        ship.addr,
        "GET http://origin.test/lost HTTP/1.1\r\nHost: origin.test\r\n\r\n",
    )
    .await;
    let lost = timeout(WAIT, reader.read_frame())
        .await
        .expect("frame in time")
        .expect("read")
        .expect("open");
    assert_eq!(request_path(&lost), "http://origin.test/lost");
    drop(writer);
    drop(reader);

    let (mut reader, writer) = accept_tunnel(&offshore).await;
    wait_connected(&ship, 2).await;

    let client = send_client_request(
        ship.addr,
        "GET http://origin.test/after HTTP/1.1\r\nHost: origin.test\r\n\r\n",
    )
    .await;
    let frame = timeout(WAIT, reader.read_frame())
        .await
        .expect("frame in time")
        .expect("read")
        .expect("open");
    assert_eq!(request_path(&frame), "http://origin.test/after");
    assert!(frame.request_id() > lost.request_id(), "ids are never reused");
    writer
        .write_frame(&TunnelFrame::new(
            frame.request_id(),
            echo_response("after").into_bytes(),
        ))
        .await
        .expect("respond");
    assert!(read_reply(client).await.ends_with("after"));

    // 断开前在途的请求不会重发，也不会收到别人的响应。
    let mut lost_client = lost_client;
    let mut byte = [0u8; 1];
    let pending = timeout(Duration::from_millis(200), lost_client.read(&mut byte)).await;
    assert!(pending.is_err(), "lost request stays pending");
    assert_eq!(ship.pending.len(), 1, "only the lost request is still waiting");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_offshore_yields_service_unavailable() {
    let closed = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = closed.local_addr();
    drop(closed);

    let ship = start_ship(addr).await;
    let client = send_client_request(ship.addr, "GET http://origin.test/ HTTP/1.1\r\n\r\n").await;
    let reply = read_reply(client).await;
    assert!(reply.starts_with("HTTP/1.1 503 Service Unavailable\r\n"), "{reply}");
    assert!(reply.contains("Content-Type: text/plain\r\n"));
    assert_ne!(ship.tunnel.state(), TunnelConnectionState::Connected);
}
