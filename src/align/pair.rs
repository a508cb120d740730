use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::seed::{consensus_hit, propose_window, OrientationTally, OrientedHits};
use super::sw::{AlignMode, Alignment, SmithWaterman};
use super::MapOpt;
use crate::error::{Error, Result, UnmapReason};
use crate::index::fm::FMIndex;
use crate::io::read::{template_name, Read};
use crate::io::sam::{AlignedSegment, SamFlag};
use crate::util::dna::SENTINEL;

/// 未估计比对质量
pub const MAPQ_UNAVAILABLE: u8 = 255;

const DEFAULT_RNAME: &str = "ref";

/// 单条 read 在参考上的最终落点
#[derive(Debug, Clone)]
struct Placement {
    read: Read,
    /// 0-based 全局起点
    ref_start: usize,
    alignment: Alignment,
}

/// 双端 read 比对器：种子 → 方向 → 共识位置 → 窗口 → Smith-Waterman → 配对检查。
///
/// 只读共享索引，`map_pair` 没有可变状态，可以在多个线程里并发调用。
pub struct ReadPairMapper<'i> {
    index: &'i FMIndex,
    /// ASCII 参考序列（不含 `$`），用于切窗口
    reference: Vec<u8>,
    rname: String,
    aligner: SmithWaterman,
    opt: MapOpt,
}

impl<'i> ReadPairMapper<'i> {
    /// 从索引反推参考序列
    pub fn new(index: &'i FMIndex, opt: MapOpt) -> Self {
        let mut reference = index.reconstruct();
        if reference.last() == Some(&SENTINEL) {
            reference.pop();
        }
        let rname = index
            .meta()
            .reference_name
            .clone()
            .unwrap_or_else(|| DEFAULT_RNAME.to_string());
        Self::with_reference(index, reference, rname, opt)
    }

    /// 调用方已持有参考序列时使用，省去一次 LF 回溯
    pub fn with_reference(index: &'i FMIndex, reference: Vec<u8>, rname: impl Into<String>, opt: MapOpt) -> Self {
        Self {
            index,
            reference,
            rname: rname.into(),
            aligner: SmithWaterman::new(opt.scoring),
            opt,
        }
    }

    pub fn reference_len(&self) -> usize {
        self.reference.len()
    }

    pub fn rname(&self) -> &str {
        &self.rname
    }

    pub fn opt(&self) -> &MapOpt {
        &self.opt
    }

    /// 两个方向各自的种子命中
    pub fn map_one(&self, read: &Read) -> OrientationTally {
        OrientationTally::collect(self.index, read, self.opt.seed_kmer_size, self.opt.kmers_per_read)
    }

    /// 只保留胜出的方向
    pub fn best_orientation(&self, read: &Read) -> OrientedHits {
        self.map_one(read).decide()
    }

    fn place(&self, oriented: OrientedHits) -> Result<Placement> {
        let hit = consensus_hit(&oriented.hits).ok_or(Error::UnmappedReadpair(UnmapReason::NoSeedHits))?;
        let window = propose_window(
            oriented.read.len(),
            hit.read_pos,
            self.reference.len(),
            hit.ref_pos as usize,
        );
        let alignment = self
            .aligner
            .align(&self.reference[window.start..window.end], &oriented.read.seq, AlignMode::Local)
            .next()
            .ok_or(Error::UnmappedReadpair(UnmapReason::NoAlignment))?;
        Ok(Placement { ref_start: window.start + alignment.ref_start, read: oriented.read, alignment })
    }

    fn segment(&self, p: &Placement, mate_bit: u16) -> AlignedSegment {
        let mut flag = SamFlag(SamFlag::PAIRED | SamFlag::PROPER_PAIR | mate_bit);
        flag.set(SamFlag::REVERSE, !p.read.is_forward());
        AlignedSegment {
            qname: template_name(&p.read.name).to_string(),
            flag,
            rname: self.rname.clone(),
            pos: (p.ref_start + 1) as u32,
            mapq: MAPQ_UNAVAILABLE,
            cigar: p.alignment.cigar_with_clips(p.read.len()),
            rnext: "=".to_string(),
            pnext: 0,
            tlen: 0,
            seq: p.read.seq.clone(),
            qual: p.read.qual.clone(),
        }
    }

    /// 比对一对 read。任一条在所选方向上没有种子命中，或两条落在同一条链上时，
    /// 返回 `UnmappedReadpair`。
    pub fn map_pair(&self, read1: &Read, read2: &Read) -> Result<(AlignedSegment, AlignedSegment)> {
        let first = self.best_orientation(read1);
        let second = self.best_orientation(read2);
        if first.hits.is_empty() || second.hits.is_empty() {
            return Err(Error::UnmappedReadpair(UnmapReason::NoSeedHits));
        }
        if first.read.strand == second.read.strand {
            return Err(Error::UnmappedReadpair(UnmapReason::SameStrand));
        }

        let first = self.place(first)?;
        let second = self.place(second)?;
        let mut seg1 = self.segment(&first, SamFlag::FIRST_IN_PAIR);
        let mut seg2 = self.segment(&second, SamFlag::SECOND_IN_PAIR);
        link_mates(&mut seg1, &mut seg2);
        Ok((seg1, seg2))
    }

    /// `map_pair` 加计数：未比对上的 pair 计入 `stats` 后返回 `None`
    pub fn map_pair_counted(
        &self,
        read1: &Read,
        read2: &Read,
        stats: &MapStats,
    ) -> Result<Option<(AlignedSegment, AlignedSegment)>> {
        stats.pairs.fetch_add(1, Ordering::Relaxed);
        match self.map_pair(read1, read2) {
            Ok(pair) => {
                stats.mapped.fetch_add(1, Ordering::Relaxed);
                Ok(Some(pair))
            }
            Err(Error::UnmappedReadpair(reason)) => {
                stats.unmapped.fetch_add(1, Ordering::Relaxed);
                log::debug!("pair '{}' unmapped: {}", template_name(&read1.name), reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 顺序消费成对的 read 流，按输入顺序产出比对上的 pair
    pub fn map_stream<'m, I>(&'m self, pairs: I, stats: &'m MapStats) -> MappedPairs<'m, 'i, I::IntoIter>
    where
        I: IntoIterator<Item = (Read, Read)>,
    {
        MappedPairs { mapper: self, pairs: pairs.into_iter(), stats }
    }
}

/// 互相填写 mate 位置、mate 方向与模板长度（最左侧的 mate 取正值）
fn link_mates(seg1: &mut AlignedSegment, seg2: &mut AlignedSegment) {
    seg1.pnext = seg2.pos;
    seg2.pnext = seg1.pos;
    seg1.flag.set(SamFlag::MATE_REVERSE, seg2.flag.is_minus_strand());
    seg2.flag.set(SamFlag::MATE_REVERSE, seg1.flag.is_minus_strand());

    let start = seg1.pos.min(seg2.pos) as i64;
    let end = seg1.reference_end().max(seg2.reference_end()) as i64;
    let span = end - start + 1;
    if seg1.pos <= seg2.pos {
        seg1.tlen = span;
        seg2.tlen = -span;
    } else {
        seg1.tlen = -span;
        seg2.tlen = span;
    }
}

/// [`ReadPairMapper::map_stream`] 返回的迭代器
pub struct MappedPairs<'m, 'i, I> {
    mapper: &'m ReadPairMapper<'i>,
    pairs: I,
    stats: &'m MapStats,
}

impl<I> Iterator for MappedPairs<'_, '_, I>
where
    I: Iterator<Item = (Read, Read)>,
{
    type Item = Result<(AlignedSegment, AlignedSegment)>;

    fn next(&mut self) -> Option<Self::Item> {
        for (r1, r2) in self.pairs.by_ref() {
            match self.mapper.map_pair_counted(&r1, &r2, self.stats) {
                Ok(Some(pair)) => return Some(Ok(pair)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// 运行计数，多线程下原子更新
#[derive(Debug, Default)]
pub struct MapStats {
    pairs: AtomicUsize,
    mapped: AtomicUsize,
    unmapped: AtomicUsize,
    skipped: AtomicUsize,
}

impl MapStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 因输入记录非法而跳过的 pair（同时计入总数）
    pub fn record_skipped(&self) {
        self.pairs.fetch_add(1, Ordering::Relaxed);
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unmapped(&self) -> usize {
        self.unmapped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MapSummary {
        MapSummary {
            pairs: self.pairs.load(Ordering::Relaxed),
            mapped: self.mapped.load(Ordering::Relaxed),
            unmapped: self.unmapped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapSummary {
    pub pairs: usize,
    pub mapped: usize,
    pub unmapped: usize,
    pub skipped: usize,
}

impl fmt::Display for MapSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} pairs: {} mapped, {} unmapped, {} skipped",
            self.pairs, self.mapped, self.unmapped, self.skipped
        )
    }
}
