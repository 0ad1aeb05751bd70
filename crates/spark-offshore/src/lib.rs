#![doc = r#"
# spark-offshore

## 设计动机（Why）
- 岸端接收船端唯一的隧道连接，把每一帧还原为一次出站 HTTP 调用；
- 读帧顺序进行以保证帧边界，执行并发进行以避免慢源站阻塞隧道。

## 组件（What）
- [`TunnelServer`]：接受循环，每条连接一个读循环，每帧一个工作任务；
- [`OffshoreConfig`]：监听地址、并发上限、出站超时与帧上限；
- 出站调用经 [`spark_http_exchange::HttpExchange`] 抽象，测试中可替换为脚本化实现。
"#]

mod config;
mod error;
mod server;

pub use config::OffshoreConfig;
pub use error::OffshoreError;
pub use server::TunnelServer;
