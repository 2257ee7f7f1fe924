use thiserror::Error;

use crate::store::StorageError;

/// 服务器生命周期错误
///
/// HTTP 处理器使用 [`crate::utils::AppError`]；这里只覆盖
/// 启动和关闭路径上的失败。
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),

    #[error("内部服务器错误: {0}")]
    Internal(#[from] anyhow::Error),
}

/// 启动路径的 Result 类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
