use std::fmt;

use thiserror::Error;

/// 读段对无法放置的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmapReason {
    /// 至少一条 read 在选定方向上没有任何种子命中
    NoSeedHits,
    /// 两条 read 落在同一条链上
    SameStrand,
    /// 候选窗口内局部比对得分不为正
    NoAlignment,
}

impl fmt::Display for UnmapReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnmapReason::NoSeedHits => "no seed hits",
            UnmapReason::SameStrand => "both mates on the same strand",
            UnmapReason::NoAlignment => "no positive-scoring alignment in window",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// 调用方错误：空参考、压缩因子为 0、打分配置缺项、索引文件损坏等
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// 单个读段对级别的可恢复错误，由配对流捕获并计数
    #[error("unmapped read pair: {0}")]
    UnmappedReadpair(UnmapReason),

    #[error("unsupported symbol '{symbol}' at position {position}")]
    AlphabetViolation { symbol: char, position: usize },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index (de)serialization failed: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}
