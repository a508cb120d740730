//! 参考序列索引：后缀数组 → BWT → 压缩 FM 索引

pub mod bwt;
pub mod csa;
pub mod fm;
pub mod sa;

pub use fm::{FMIndex, IndexMeta, IndexParams};
pub use sa::{build_sa, SaStrategy};
