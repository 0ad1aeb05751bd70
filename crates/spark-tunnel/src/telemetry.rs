use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// 安装全局 `fmt` 订阅者。
///
/// `RUST_LOG` 存在时优先使用，否则使用配置给出的级别或指令。
pub fn init(log_level: &str) -> anyhow::Result<()> {
    let filter = build_env_filter(log_level)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn build_env_filter(log_level: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level)
            .map_err(|err| anyhow!("invalid log level `{log_level}`: {err}")),
    }
}
