use crate::error::{Error, Result};
use crate::util::dna;

/// Phred+33 编码偏移
pub const PHRED_OFFSET: u8 = 33;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn flip(self) -> Self {
        match self {
            Strand::Forward => Strand::Reverse,
            Strand::Reverse => Strand::Forward,
        }
    }
}

/// 一条测序读段。`seq` 已转大写且只含 {A, C, G, N, T}。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub name: String,
    pub seq: Vec<u8>,
    /// Phred+33 质量字符串
    pub qual: Vec<u8>,
    pub strand: Strand,
}

impl Read {
    pub fn new(name: impl Into<String>, seq: &[u8], qual: &[u8]) -> Result<Self> {
        let name = name.into();
        if seq.len() != qual.len() {
            return Err(Error::invalid(format!(
                "read '{}': sequence length {} != quality length {}",
                name,
                seq.len(),
                qual.len()
            )));
        }
        let seq = dna::normalize_seq(seq)?;
        Ok(Self { name, seq, qual: qual.to_vec(), strand: Strand::Forward })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    #[inline]
    pub fn is_forward(&self) -> bool {
        self.strand == Strand::Forward
    }

    /// 反向互补视图：序列反向互补，质量反转，链方向翻转
    pub fn reversed(&self) -> Self {
        Self {
            name: self.name.clone(),
            seq: dna::revcomp(&self.seq),
            qual: self.qual.iter().rev().copied().collect(),
            strand: self.strand.flip(),
        }
    }

    /// 解码后的 Phred 质量值
    pub fn phred(&self) -> Vec<u8> {
        self.qual.iter().map(|&q| q.saturating_sub(PHRED_OFFSET)).collect()
    }
}

/// 片段名：去掉 mate 的 `/1`、`/2` 后缀，两条 mate 在 SAM 里共用它作 QNAME
pub fn template_name(name: &str) -> &str {
    name.strip_suffix("/1").or_else(|| name.strip_suffix("/2")).unwrap_or(name)
}

/// 去掉 `/1`、`/2` 后缀后比较两条 mate 的名字
pub fn mate_names_match(a: &str, b: &str) -> bool {
    template_name(a) == template_name(b)
}
