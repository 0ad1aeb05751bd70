#![doc = r#"
# spark-transport-tcp

## 设计动机（Why）
- **定位**：该 crate 提供隧道两端在 Tokio 运行时上的最小 TCP 通道实现，
  封装监听、建连、套接字调优以及“按帧读写”的细节。
- **架构角色**：船端隧道客户端与岸端隧道服务器共用这一层，保证两侧对同一条
  物理连接的读写纪律一致：每个方向只有一个读者，写入由一把写锁串行化。

## 核心契约（What）
- [`TcpListener`]：绑定与接受连接，失败时返回带稳定错误码的 [`TransportError`]；
- [`TcpChannel`]：主动建连或包装已接受的连接，并可拆分为
  [`FrameReader`] / [`FrameWriter`]；
- [`FrameWriter`]：可克隆，所有克隆共享同一把写锁，一帧的字节不会被另一帧打断；
- [`FrameReader`]：独占读半部，容忍任意粒度的短读。

## 实现策略（How）
- 完全依赖 Tokio 的 `TcpListener` / `TcpStream`；读写半部通过 `into_split` 拆分，
  读路径无需加锁；
- 错误按操作类型映射为稳定错误码，并根据 `io::ErrorKind` 给出是否可重试的判断。

## 风险与考量（Trade-offs）
- 写锁只在一帧写完（含 flush）期间持有；若写入中途失败，该连接上的字节流已不可信，
  调用方必须丢弃整条连接。
"#]

mod channel;
mod error;
mod framed;
mod listener;
mod util;

pub use channel::TcpChannel;
pub use error::{OperationKind, TransportError};
pub use framed::{FrameReader, FrameWriter};
pub use listener::TcpListener;
pub use util::tune_tunnel_socket;
