//! # fmpair
//!
//! 基于压缩 FM 索引的双端短读段比对器。
//!
//! 本 crate 提供：
//!
//! - **索引构建**：三种后缀数组构建算法（朴素排序、倍增、DC3 线性递归），BWT，
//!   采样 Occ 表与压缩后缀数组（位向量 + 分桶 popcount）
//! - **精确查询**：后向搜索，返回 kmer 在参考中的全部起始位置
//! - **序列比对**：线性间隙的 Smith-Waterman（局部 / 半局部），惰性回溯
//! - **双端配对**：种子 → 方向判定 → 中位数共识 → 窗口 → 比对 → 配对一致性检查
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use fmpair::align::{MapOpt, ReadPairMapper};
//! use fmpair::index::{FMIndex, IndexParams};
//! use fmpair::io::Read;
//! use fmpair::util::dna;
//!
//! let reference = b"TTGACCGATAGGCATCCAGTTACGGATCAATGCCTAGGACTTAACGTAGCATGCA";
//! let fm = FMIndex::build(reference, IndexParams::default())?;
//! println!("'GGATCA' at {:?}", fm.query(b"GGATCA"));
//!
//! let opt = MapOpt { seed_kmer_size: 8, ..MapOpt::default() };
//! let mapper = ReadPairMapper::new(&fm, opt);
//! let r1 = Read::new("frag/1", &reference[2..22], &[b'I'; 20])?;
//! let r2 = Read::new("frag/2", &dna::revcomp(&reference[30..50]), &[b'I'; 20])?;
//! let (s1, s2) = mapper.map_pair(&r1, &r2)?;
//! println!("{}\n{}", s1.to_sam_line(), s2.to_sam_line());
//! # Ok::<(), fmpair::Error>(())
//! ```
//!
//! ## 模块说明
//!
//! - [`index`] — 后缀数组、BWT、FM 索引及其持久化
//! - [`align`] — Smith-Waterman、种子与窗口、双端比对与并行驱动
//! - [`io`] — FASTA / FASTQ 读取、`Read`、SAM 输出
//! - [`util`] — DNA 字母表编码 / 反向互补
//! - [`error`] — 错误类型

pub mod align;
pub mod error;
pub mod index;
pub mod io;
pub mod util;

pub use error::{Error, Result, UnmapReason};
