use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 压缩后缀数组：只保留 SA[i] % step == 0 的条目。
///
/// - `marks`：长度为 n 的位向量，标记哪些行被保留（step == 1 时为空）
/// - `buckets`：每 `bucket_step` 行一个累计 popcount，`buckets[k]` 为 `marks[0..=k*bucket_step]` 中 1 的个数
///
/// 行 i 的采样秩 = `buckets[i / bucket_step]` + 桶边界之后到 i 的 popcount，
/// 扫描长度不超过 `bucket_step = floor(log2 n)`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampledSa {
    step: u32,
    len: u32,
    values: Vec<u32>,
    marks: Option<BitVec<u64, Lsb0>>,
    buckets: Vec<u32>,
    bucket_step: u32,
}

impl SampledSa {
    pub fn build(sa: Vec<u32>, step: usize) -> Self {
        let n = sa.len();
        let bucket_step = bucket_step_for(n);
        if step <= 1 {
            return Self {
                step: 1,
                len: n as u32,
                values: sa,
                marks: None,
                buckets: Vec::new(),
                bucket_step: bucket_step as u32,
            };
        }

        let mut values = Vec::with_capacity(n / step + 1);
        let mut marks: BitVec<u64, Lsb0> = BitVec::with_capacity(n);
        let mut buckets = Vec::with_capacity(n / bucket_step + 1);
        let mut rank = 0u32;
        for (row, &pos) in sa.iter().enumerate() {
            let keep = pos as usize % step == 0;
            marks.push(keep);
            if keep {
                rank += 1;
                values.push(pos);
            }
            if row % bucket_step == 0 {
                buckets.push(rank);
            }
        }

        Self {
            step: step as u32,
            len: n as u32,
            values,
            marks: Some(marks),
            buckets,
            bucket_step: bucket_step as u32,
        }
    }

    #[inline]
    pub fn step(&self) -> usize {
        self.step as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn bucket_step(&self) -> usize {
        self.bucket_step as usize
    }

    /// 保留的条目数
    pub fn sampled_count(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.marks.is_none()
    }

    #[inline]
    pub fn is_sampled(&self, row: usize) -> bool {
        match &self.marks {
            None => true,
            Some(marks) => marks[row],
        }
    }

    /// `row` 及其之前被保留的条目数
    pub fn rank_bit(&self, row: usize) -> usize {
        let marks = match &self.marks {
            None => return row + 1,
            Some(m) => m,
        };
        let bs = self.bucket_step as usize;
        let bi = row / bs;
        let boundary = bi * bs;
        self.buckets[bi] as usize + marks[boundary + 1..row + 1].count_ones()
    }

    /// 已采样行的 SA 值；未采样返回 None
    #[inline]
    pub fn sampled_value(&self, row: usize) -> Option<u32> {
        if !self.is_sampled(row) {
            return None;
        }
        Some(self.values[self.rank_bit(row) - 1])
    }

    /// 检查采样值与 rank 桶：每个桶必须等于其边界行（含）之前的置位数
    pub(crate) fn validate(&self) -> Result<()> {
        let n = self.len as usize;
        if self.step == 0 || self.bucket_step == 0 {
            return Err(Error::invalid("suffix array sampling parameters must be positive"));
        }
        let step = self.step as usize;
        if self.values.iter().any(|&v| v as usize >= n || v as usize % step != 0) {
            return Err(Error::invalid("suffix array holds out-of-range values"));
        }
        match &self.marks {
            None => {
                if self.values.len() != n {
                    return Err(Error::invalid("uncompressed suffix array has wrong length"));
                }
            }
            Some(marks) => {
                let bs = self.bucket_step as usize;
                let expected_buckets = if n == 0 { 0 } else { (n - 1) / bs + 1 };
                if marks.len() != n
                    || marks.count_ones() != self.values.len()
                    || self.buckets.len() != expected_buckets
                {
                    return Err(Error::invalid("compressed suffix array tables are inconsistent"));
                }
                let mut rank = 0u32;
                for (row, bit) in marks.iter().by_vals().enumerate() {
                    if bit {
                        rank += 1;
                    }
                    if row % bs == 0 && self.buckets[row / bs] != rank {
                        return Err(Error::invalid("suffix array rank buckets disagree with sample marks"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// floor(log2 n)，至少为 1
pub fn bucket_step_for(n: usize) -> usize {
    if n < 2 {
        1
    } else {
        (usize::BITS - 1 - n.leading_zeros()) as usize
    }
}
