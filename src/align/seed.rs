use crate::index::fm::FMIndex;
use crate::io::read::Read;

/// 窗口两侧至少预留的碱基数，容纳 indel
const MIN_WINDOW_SLACK: usize = 16;

/// 一个种子命中：read 上的偏移与参考上的偏移
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedHit {
    pub read_pos: usize,
    pub ref_pos: u32,
}

/// 在 read 上均匀取至多 max_n 个长度为 k 的种子起点；
/// 个数不超过 len / k，因此相邻种子互不重叠。
pub fn seed_offsets(read_len: usize, k: usize, max_n: usize) -> Vec<usize> {
    if k == 0 || max_n == 0 || read_len < k {
        return Vec::new();
    }
    let count = max_n.min(read_len / k);
    if count == 1 {
        return vec![0];
    }
    let span = read_len - k;
    (0..count).map(|i| i * span / (count - 1)).collect()
}

/// 用 FM 索引查询每个种子，收集 (read 偏移, 参考偏移)
pub fn seed_hits(index: &FMIndex, seq: &[u8], k: usize, max_n: usize) -> Vec<SeedHit> {
    let mut hits = Vec::new();
    for read_pos in seed_offsets(seq.len(), k, max_n) {
        for ref_pos in index.query(&seq[read_pos..read_pos + k]) {
            hits.push(SeedHit { read_pos, ref_pos });
        }
    }
    hits
}

/// 某一方向上的 read 及其种子命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientedHits {
    pub read: Read,
    pub hits: Vec<SeedHit>,
}

/// 正向与反向互补两个方向的种子命中统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrientationTally {
    pub forward: OrientedHits,
    pub reverse: OrientedHits,
}

impl OrientationTally {
    pub fn collect(index: &FMIndex, read: &Read, k: usize, max_n: usize) -> Self {
        let forward = read.clone();
        let reverse = read.reversed();
        let fwd_hits = seed_hits(index, &forward.seq, k, max_n);
        let rev_hits = seed_hits(index, &reverse.seq, k, max_n);
        Self {
            forward: OrientedHits { read: forward, hits: fwd_hits },
            reverse: OrientedHits { read: reverse, hits: rev_hits },
        }
    }

    /// 保留命中更多的方向；相等时保留正向
    pub fn decide(self) -> OrientedHits {
        if self.reverse.hits.len() > self.forward.hits.len() {
            self.reverse
        } else {
            self.forward
        }
    }
}

/// 第 50 百分位（nearest 插值，不取平均）。
/// 排名恰好落在两个值中间时取偶数下标，与 round-half-to-even 一致。
pub fn nearest_rank_median(values: &[u32]) -> Option<u32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let last = sorted.len() - 1;
    let half = last / 2;
    let idx = if last % 2 == 0 || half % 2 == 0 { half } else { half + 1 };
    Some(sorted[idx])
}

/// 参考偏移等于中位数的第一个命中
pub fn consensus_hit(hits: &[SeedHit]) -> Option<SeedHit> {
    let refs: Vec<u32> = hits.iter().map(|h| h.ref_pos).collect();
    let median = nearest_rank_median(&refs)?;
    hits.iter().copied().find(|h| h.ref_pos == median)
}

/// 参考上的候选窗口 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// 以种子推断的 read 起点为中心，两侧各留 max(read_len / 2, 16) 的余量，裁剪到 [0, ref_len)
pub fn propose_window(read_len: usize, read_pos: usize, ref_len: usize, ref_pos: usize) -> Window {
    let slack = (read_len / 2).max(MIN_WINDOW_SLACK) as i64;
    let origin = ref_pos as i64 - read_pos as i64;
    let start = (origin - slack).max(0) as usize;
    let end = ((origin + read_len as i64 + slack).max(0) as usize).min(ref_len);
    Window { start: start.min(end), end }
}
