pub type Result<T> = std::result::Result<T, Error>;

// 错误大致分为两类：
//  - 启动期错误：向上传播到 main，记录日志后以非零状态退出
//  - 单次清理中的错误：不会出现在这里，由 janitor 记录并计入失败数
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // 配置无效
    #[error("invalid configuration: {0}")]
    Config(String),
    // 服务管理命令失败
    #[error("service control `{action}` failed: {reason}")]
    ServiceControl { action: String, reason: String },
    // 内部通用错误
    #[error("internal error: {0}")]
    Internal(String),
    // 包装 tokio 的 JoinError（清理过程中 panic）
    #[error("task join error: {0}")]
    TokioTaskJoin(#[from] tokio::task::JoinError),
    // 包装 std::io::Error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    // 包装 JobSchedulerError
    #[error("job scheduler error: {0}")]
    JobScheduler(#[from] tokio_cron_scheduler::JobSchedulerError),
    // 包装 serde_yaml::Error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    // 包装日志文件初始化错误
    #[error("log file error: {0}")]
    LogInit(#[from] tracing_appender::rolling::InitError),
}

#[macro_export]
macro_rules! fail {
    ($msg:expr) => {
        $crate::errors::Error::Internal(format!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::errors::Error::Internal(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! err {
    ($msg:expr) => {
        Err($crate::fail!($msg))
    };
    ($fmt:expr, $($arg:tt)*) => {
        Err($crate::fail!($fmt, $($arg)*))
    };
}
