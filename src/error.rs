use thiserror::Error;

/// 计算过程中可能出现的错误
///
/// 只有输入/参数错误会作为硬错误返回给调用方；
/// `Insufficient` 只在单个分块内部出现，会被降级为全零子矩阵。
#[derive(Error, Debug)]
pub enum CovarError {
    /// 空输入、长度不一致、非法权重等
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// 参数超出合法范围
    #[error("invalid parameter: {0}")]
    InvalidParams(String),
    /// 过滤后剩余数据不足以计算
    #[error("insufficient data: {0}")]
    Insufficient(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Encode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, CovarError>;
