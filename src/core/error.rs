use thiserror::Error;

/// 核心错误类型 - 容器服务 / 解码注册表 / 播放管线统一返回
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("参数无效: {0}")]
    InvalidParam(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("不支持: {0}")]
    NotSupported(String),

    #[error("暂无数据")]
    Timeout,

    #[error("当前状态不允许该操作: {0}")]
    Busy(String),

    #[error("IO 错误: {0}")]
    Io(String),

    #[error("网络错误: {0}")]
    Network(String),

    #[error("内存不足")]
    NoMemory,

    #[error("其他错误: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
