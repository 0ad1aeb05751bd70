use spark_http_exchange::ExchangeError;
use spark_transport_tcp::TransportError;
use thiserror::Error;

/// 岸端启动阶段的错误。
///
/// 运行期的故障（单条连接断开、单次调用失败）都在服务器内部消化，不会出现在这里。
#[derive(Debug, Error)]
pub enum OffshoreError {
    /// 绑定监听地址失败。
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// 构造出站执行器失败。
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl OffshoreError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            OffshoreError::Transport(err) => err.code(),
            OffshoreError::Exchange(err) => err.code(),
        }
    }
}
