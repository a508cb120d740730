use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::index::bwt::build_bwt;
use crate::index::csa::SampledSa;
use crate::index::sa::{build_sa, SaStrategy};
use crate::util::dna::{self, SENTINEL, SENTINEL_CODE, SIGMA};

/// Occ 采样只记录非哨兵字母 {A, C, G, N, T}；哨兵只出现一次，只需记住它所在的行
const TALLY: usize = SIGMA - 1;

/// 索引构建参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub strategy: SaStrategy,
    /// Occ 表每隔多少行保存一次检查点（1 = 不压缩）
    pub compression_occ: usize,
    /// 只保留 SA[i] % compression_sa == 0 的条目（1 = 不压缩）
    pub compression_sa: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self { strategy: SaStrategy::LinearRecursive, compression_occ: 32, compression_sa: 32 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub reference_name: Option<String>,
    pub reference_file: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 压缩 FM 索引：BWT + C 表 + 采样 Occ 表 + 压缩后缀数组。
///
/// 构建后只读，可在线程间共享查询。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FMIndex {
    strategy: SaStrategy,
    compression_occ: u32,
    /// C[a] = 文本中字母 < a 的累计数量
    c: [u32; SIGMA],
    /// BWT 序列（字母表编码）
    bwt: Vec<u8>,
    /// Occ 检查点（行优先展平）：occ_samples[k * TALLY + (a - 1)] = BWT[0..k*compression_occ) 中 a 的个数
    occ_samples: Vec<u32>,
    /// 哨兵在 BWT 中的行号
    sentinel_row: u32,
    sa: SampledSa,
    meta: IndexMeta,
}

impl FMIndex {
    /// 从 ASCII 参考序列构建索引。末尾缺少 `$` 时自动补上。
    pub fn build(reference: &[u8], params: IndexParams) -> Result<Self> {
        if params.compression_occ == 0 || params.compression_sa == 0 {
            return Err(Error::invalid("compression factors must be >= 1"));
        }
        let body = reference.strip_suffix(&[SENTINEL]).unwrap_or(reference);
        if body.is_empty() {
            return Err(Error::invalid("reference text is empty"));
        }
        let mut text = dna::encode(body)?;
        text.push(SENTINEL_CODE);
        if text.len() > u32::MAX as usize {
            return Err(Error::invalid("reference longer than 2^32 - 1 symbols"));
        }

        log::debug!("building suffix array ({:?}) over {} symbols", params.strategy, text.len());
        let sa = build_sa(&text, params.strategy);
        let bwt = build_bwt(&text, &sa);
        let idx = Self::from_parts(bwt, sa, params);
        log::debug!(
            "FM index ready: occ checkpoints = {}, sampled SA = {}/{}",
            idx.occ_samples.len() / TALLY,
            idx.sa.sampled_count(),
            idx.len()
        );
        Ok(idx)
    }

    fn from_parts(bwt: Vec<u8>, sa: Vec<u32>, params: IndexParams) -> Self {
        let n = bwt.len();
        let co = params.compression_occ;

        // 计算 C 表
        let mut freq = [0u32; SIGMA];
        for &ch in &bwt {
            freq[ch as usize] += 1;
        }
        let mut c = [0u32; SIGMA];
        let mut acc = 0u32;
        for a in 0..SIGMA {
            c[a] = acc;
            acc += freq[a];
        }

        // 采样 Occ：检查点 k 记录 BWT[0..k*co) 的累计
        let mut occ_samples = Vec::with_capacity((n / co + 1) * TALLY);
        let mut running = [0u32; TALLY];
        let mut sentinel_row = 0u32;
        for (i, &ch) in bwt.iter().enumerate() {
            if i % co == 0 {
                occ_samples.extend_from_slice(&running);
            }
            if ch == SENTINEL_CODE {
                sentinel_row = i as u32;
            } else {
                running[ch as usize - 1] += 1;
            }
        }
        if n % co == 0 {
            occ_samples.extend_from_slice(&running);
        }

        Self {
            strategy: params.strategy,
            compression_occ: co as u32,
            c,
            bwt,
            occ_samples,
            sentinel_row,
            sa: SampledSa::build(sa, params.compression_sa),
            meta: IndexMeta::default(),
        }
    }

    /// BWT 长度（含哨兵）
    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// 参考序列长度（不含哨兵）
    #[inline]
    pub fn text_len(&self) -> usize {
        self.bwt.len().saturating_sub(1)
    }

    pub fn params(&self) -> IndexParams {
        IndexParams {
            strategy: self.strategy,
            compression_occ: self.compression_occ as usize,
            compression_sa: self.sa.step(),
        }
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    pub fn bwt(&self) -> &[u8] {
        &self.bwt
    }

    pub fn freq_table(&self) -> &[u32; SIGMA] {
        &self.c
    }

    pub fn sentinel_row(&self) -> usize {
        self.sentinel_row as usize
    }

    pub fn suffix_array(&self) -> &SampledSa {
        &self.sa
    }

    #[inline]
    fn sample(&self, k: usize, a: u8) -> u32 {
        self.occ_samples[k * TALLY + a as usize - 1]
    }

    /// BWT[0..pos) 中 a 的出现次数（a 为字母表编码）
    pub fn occ(&self, a: u8, pos: usize) -> u32 {
        if a == SENTINEL_CODE {
            return u32::from(pos > self.sentinel_row as usize);
        }
        let co = self.compression_occ as usize;
        let k = pos / co;
        let r = pos % co;
        if r == 0 {
            return self.sample(k, a);
        }
        // 离哪个检查点近就从哪个扫
        let upper = (k + 1) * co;
        if 2 * r < co || upper > self.bwt.len() {
            let add = self.bwt[k * co..pos].iter().filter(|&&ch| ch == a).count() as u32;
            self.sample(k, a) + add
        } else {
            let sub = self.bwt[pos..upper].iter().filter(|&&ch| ch == a).count() as u32;
            self.sample(k + 1, a) - sub
        }
    }

    /// BWT[0..=pos] 中 a 的出现次数
    #[inline]
    pub fn rank(&self, a: u8, pos: usize) -> u32 {
        self.occ(a, pos + 1)
    }

    /// LF 映射：行 row 对应文本位置的前一个位置所在的行
    #[inline]
    pub fn lf(&self, row: usize) -> usize {
        let a = self.bwt[row];
        (self.c[a as usize] + self.rank(a, row)) as usize - 1
    }

    /// 压缩后缀数组的第 row 项：未采样时沿 LF 回走直到采样行
    pub fn sa_value(&self, row: usize) -> usize {
        let mut row = row;
        let mut steps = 0usize;
        loop {
            if let Some(v) = self.sa.sampled_value(row) {
                return v as usize + steps;
            }
            row = self.lf(row);
            steps += 1;
        }
    }

    /// 在区间 [l, r) 上扩展字符 a 后的新区间
    #[inline]
    pub fn rank_range(&self, a: u8, l: usize, r: usize) -> (usize, usize) {
        let c0 = self.c[a as usize] as usize;
        (c0 + self.occ(a, l) as usize, c0 + self.occ(a, r) as usize)
    }

    /// 反向搜索精确匹配，pat 已经是编码后的字母表
    pub fn backward_search(&self, pat: &[u8]) -> Option<(usize, usize)> {
        if self.bwt.is_empty() {
            return None;
        }
        let mut l = 0usize;
        let mut r = self.bwt.len();
        for &a in pat.iter().rev() {
            if a as usize >= SIGMA {
                return None;
            }
            let (nl, nr) = self.rank_range(a, l, r);
            if nl >= nr {
                return None;
            }
            l = nl;
            r = nr;
        }
        Some((l, r))
    }

    /// kmer 在参考中所有出现的起始位置（升序）。无匹配或含非法字符时返回空。
    pub fn query(&self, kmer: &[u8]) -> Vec<u32> {
        if kmer.is_empty() {
            return Vec::new();
        }
        let pat = match dna::encode(kmer) {
            Ok(p) => p,
            Err(_) => return Vec::new(),
        };
        let (l, r) = match self.backward_search(&pat) {
            Some(range) => range,
            None => return Vec::new(),
        };
        let mut hits: Vec<u32> = (l..r).map(|row| self.sa_value(row) as u32).collect();
        hits.sort_unstable();
        hits
    }

    /// kmer 的出现次数，不展开后缀数组
    pub fn count(&self, kmer: &[u8]) -> usize {
        if kmer.is_empty() {
            return 0;
        }
        dna::encode(kmer)
            .ok()
            .and_then(|pat| self.backward_search(&pat))
            .map_or(0, |(l, r)| r - l)
    }

    /// 由 BWT 反推原文（含末尾 `$`），用于自检
    pub fn reconstruct(&self) -> Vec<u8> {
        let n = self.bwt.len();
        if n == 0 {
            return Vec::new();
        }
        let mut out = vec![SENTINEL; n];
        let mut row = 0usize;
        for i in (0..n - 1).rev() {
            out[i] = dna::from_alphabet(self.bwt[row]);
            row = self.lf(row);
        }
        out
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let idx: Self = bincode::deserialize(bytes)?;
        idx.validate()?;
        Ok(idx)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut w, self)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let r = BufReader::new(File::open(path)?);
        let idx: Self = bincode::deserialize_from(r)?;
        idx.validate()?;
        Ok(idx)
    }

    /// 反序列化后的检查：C 表与 Occ 检查点都从 BWT 重新计算并逐项比对
    fn validate(&self) -> Result<()> {
        let n = self.bwt.len();
        let co = self.compression_occ as usize;
        if n < 2 || co == 0 {
            return Err(Error::invalid("index is empty or has zero occ sampling"));
        }
        if self.bwt.iter().any(|&a| a as usize >= SIGMA) {
            return Err(Error::invalid("BWT contains symbols outside the alphabet"));
        }
        let sentinels = self.bwt.iter().filter(|&&a| a == SENTINEL_CODE).count();
        let row = self.sentinel_row as usize;
        if sentinels != 1 || row >= n || self.bwt[row] != SENTINEL_CODE {
            return Err(Error::invalid("BWT must contain exactly one sentinel"));
        }

        let mut freq = [0u32; SIGMA];
        for &ch in &self.bwt {
            freq[ch as usize] += 1;
        }
        let mut acc = 0u32;
        for a in 0..SIGMA {
            if self.c[a] != acc {
                return Err(Error::invalid("frequency table disagrees with BWT"));
            }
            acc += freq[a];
        }

        if self.occ_samples.len() != (n / co + 1) * TALLY {
            return Err(Error::invalid("occurrence table has wrong length"));
        }
        let mut running = [0u32; TALLY];
        let mut checkpoints = self.occ_samples.chunks_exact(TALLY);
        for (i, &ch) in self.bwt.iter().enumerate() {
            if i % co == 0 && checkpoints.next() != Some(&running[..]) {
                return Err(Error::invalid("occurrence checkpoints disagree with BWT"));
            }
            if ch != SENTINEL_CODE {
                running[ch as usize - 1] += 1;
            }
        }
        if n % co == 0 && checkpoints.next() != Some(&running[..]) {
            return Err(Error::invalid("occurrence checkpoints disagree with BWT"));
        }

        if self.sa.len() != n {
            return Err(Error::invalid("suffix array length differs from BWT"));
        }
        self.sa.validate()?;
        // LF 游走终止于文本位置 0 所在行
        if !self.sa.is_sampled(row) {
            return Err(Error::invalid("suffix array does not sample the text start"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(text: &[u8], occ: usize, sa: usize) -> FMIndex {
        FMIndex::build(
            text,
            IndexParams { strategy: SaStrategy::LinearRecursive, compression_occ: occ, compression_sa: sa },
        )
        .unwrap()
    }

    fn naive_positions(text: &[u8], pat: &[u8]) -> Vec<u32> {
        if pat.len() > text.len() {
            return Vec::new();
        }
        (0..=text.len() - pat.len())
            .filter(|&i| &text[i..i + pat.len()] == pat)
            .map(|i| i as u32)
            .collect()
    }

    #[test]
    fn rejects_bad_input() {
        let p = IndexParams::default();
        assert!(matches!(FMIndex::build(b"", p), Err(Error::InvalidInput(_))));
        assert!(matches!(FMIndex::build(b"$", p), Err(Error::InvalidInput(_))));
        let zero = IndexParams { compression_occ: 0, ..p };
        assert!(matches!(FMIndex::build(b"ACGT", zero), Err(Error::InvalidInput(_))));
        let zero = IndexParams { compression_sa: 0, ..p };
        assert!(matches!(FMIndex::build(b"ACGT", zero), Err(Error::InvalidInput(_))));
        assert!(matches!(
            FMIndex::build(b"ACGU", p),
            Err(Error::AlphabetViolation { symbol: 'U', position: 3 })
        ));
        assert!(matches!(FMIndex::build(b"AC$GT", p), Err(Error::AlphabetViolation { .. })));
    }

    #[test]
    fn sentinel_is_optional_in_input() {
        let a = build(b"GATTACA", 2, 2);
        let b = build(b"GATTACA$", 2, 2);
        assert_eq!(a.bwt(), b.bwt());
        assert_eq!(a.reconstruct(), b"GATTACA$".to_vec());
    }

    #[test]
    fn frequency_table_is_cumulative() {
        // $ A C G N T
        let idx = build(b"ACGTNAAC", 4, 4);
        assert_eq!(idx.freq_table(), &[0, 1, 4, 6, 7, 8]);
    }

    #[test]
    fn rank_matches_naive_counts() {
        let text = b"ACGTTGCANNACGTACGGGTTACCA";
        for co in [1usize, 2, 3, 5, 8, 32] {
            let idx = build(text, co, 4);
            let bwt = idx.bwt().to_vec();
            for a in 0..SIGMA as u8 {
                let mut naive = 0u32;
                for (pos, &ch) in bwt.iter().enumerate() {
                    if ch == a {
                        naive += 1;
                    }
                    assert_eq!(idx.rank(a, pos), naive, "co={} a={} pos={}", co, a, pos);
                }
                assert_eq!(idx.occ(a, 0), 0);
            }
        }
    }

    #[test]
    fn sa_values_match_full_array() {
        let text = b"TTAGGCATCANNGATTACAGATTACA";
        let full = build(text, 1, 1);
        for sa_step in [2usize, 3, 8, 32] {
            let idx = build(text, 4, sa_step);
            for row in 0..idx.len() {
                assert_eq!(idx.sa_value(row), full.sa_value(row), "step={} row={}", sa_step, row);
            }
        }
    }

    #[test]
    fn query_finds_every_occurrence() {
        let text = b"GATTACAGATTACAGGATTTACANNACGT";
        let idx = build(text, 4, 4);
        for len in 1..=text.len() {
            for start in 0..=text.len() - len {
                let pat = &text[start..start + len];
                assert_eq!(idx.query(pat), naive_positions(text, pat), "pat={:?}", pat);
            }
        }
        assert!(idx.query(b"CCCCC").is_empty());
        assert!(idx.query(b"").is_empty());
        assert!(idx.query(b"GAXT").is_empty());
        assert_eq!(idx.count(b"GATTACA"), 2);
    }

    #[test]
    fn reconstruct_round_trip() {
        let text = b"NNACGTACGGTACCATGACTGACTNACG";
        for strategy in [SaStrategy::Simple, SaStrategy::PrefixDoubling, SaStrategy::LinearRecursive] {
            for k in [1usize, 2, 8, 32] {
                let idx = FMIndex::build(
                    text,
                    IndexParams { strategy, compression_occ: k, compression_sa: k },
                )
                .unwrap();
                let mut expected = text.to_vec();
                expected.push(b'$');
                assert_eq!(idx.reconstruct(), expected, "{:?} k={}", strategy, k);
            }
        }
    }

    #[test]
    fn bytes_round_trip() {
        let idx = build(b"ACGTTGCAACGGTTACCAGTNACGTAC", 3, 5);
        let bytes = idx.to_bytes().unwrap();
        let back = FMIndex::from_bytes(&bytes).unwrap();
        assert_eq!(back.bwt(), idx.bwt());
        assert_eq!(back.params(), idx.params());
        let kmers: [&[u8]; 4] = [b"ACG", b"GTT", b"T", b"CCAGTN"];
        for kmer in kmers {
            assert_eq!(back.query(kmer), idx.query(kmer));
        }
    }

    #[test]
    fn corrupt_bytes_are_rejected() {
        let idx = build(b"ACGTTGCA", 2, 2);
        let bytes = idx.to_bytes().unwrap();
        assert!(FMIndex::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn tampered_frequency_table_is_rejected() {
        let idx = build(b"ACGTTGCA", 2, 2);
        let mut bad = idx.clone();
        bad.c[5] = idx.len() as u32;
        let bytes = bad.to_bytes().unwrap();
        assert!(matches!(FMIndex::from_bytes(&bytes), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn tampered_occ_checkpoint_is_rejected() {
        let idx = build(b"GATTACAGATTACA", 4, 2);
        // 让中间检查点变大：单调性与总数都会被打破
        let mut bad = idx.clone();
        bad.occ_samples[TALLY] += 7;
        assert!(matches!(FMIndex::from_bytes(&bad.to_bytes().unwrap()), Err(Error::InvalidInput(_))));

        let mut bad = idx.clone();
        let last = bad.occ_samples.len() - 1;
        bad.occ_samples[last] = 0;
        assert!(matches!(FMIndex::from_bytes(&bad.to_bytes().unwrap()), Err(Error::InvalidInput(_))));

        let mut bad = idx.clone();
        bad.sentinel_row = idx.len() as u32 + 3;
        assert!(matches!(FMIndex::from_bytes(&bad.to_bytes().unwrap()), Err(Error::InvalidInput(_))));

        assert!(FMIndex::from_bytes(&idx.to_bytes().unwrap()).is_ok());
    }
}
