//! 比对：Smith-Waterman、种子与窗口、双端配对，以及成批并行处理双端 FASTQ 的驱动。

pub mod pair;
pub mod seed;
pub mod sw;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;

use crate::error::Error;
use crate::index::fm::FMIndex;
use crate::io::fastq::{FastqReader, FastqRecord};
use crate::io::read::mate_names_match;
use crate::io::sam::{AlignedSegment, SamWriter};

pub use pair::{MapStats, MapSummary, ReadPairMapper};
pub use sw::{AlignMode, Alignment, EditOp, Scoring, SmithWaterman};

/// 比对参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOpt {
    /// 每条 read 最多取多少个种子
    pub kmers_per_read: usize,
    /// 种子长度
    pub seed_kmer_size: usize,
    pub scoring: Scoring,
    /// 工作线程数
    pub threads: usize,
    /// 每批读入的 pair 数
    pub batch_size: usize,
}

impl Default for MapOpt {
    fn default() -> Self {
        Self {
            kmers_per_read: 5,
            seed_kmer_size: 26,
            scoring: Scoring::default(),
            threads: 1,
            batch_size: 4096,
        }
    }
}

impl MapOpt {
    pub fn validate(&self) -> crate::Result<()> {
        if self.kmers_per_read == 0 {
            return Err(Error::invalid("kmers_per_read must be >= 1"));
        }
        if self.seed_kmer_size == 0 {
            return Err(Error::invalid("seed_kmer_size must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid("batch_size must be >= 1"));
        }
        Ok(())
    }
}

fn open_fastq(path: &Path) -> Result<FastqReader<BufReader<File>>> {
    let fh = File::open(path).with_context(|| format!("cannot open FASTQ '{}'", path.display()))?;
    Ok(FastqReader::new(BufReader::new(fh)))
}

/// 从两个同步的 FASTQ 流中读出至多 `n` 对记录。mate 名字不一致或条数不同视为致命错误。
fn read_batch<R1: BufRead, R2: BufRead>(
    r1: &mut FastqReader<R1>,
    r2: &mut FastqReader<R2>,
    n: usize,
) -> Result<Vec<(FastqRecord, FastqRecord)>> {
    let mut batch = Vec::with_capacity(n);
    while batch.len() < n {
        match (r1.next_record()?, r2.next_record()?) {
            (None, None) => break,
            (Some(a), Some(b)) => {
                if !mate_names_match(&a.id, &b.id) {
                    return Err(Error::invalid(format!(
                        "paired FASTQ files out of sync: '{}' vs '{}'",
                        a.id, b.id
                    ))
                    .into());
                }
                batch.push((a, b));
            }
            (Some(a), None) => bail!("second FASTQ ended before mate of '{}'", a.id),
            (None, Some(b)) => bail!("first FASTQ ended before mate of '{}'", b.id),
        }
    }
    Ok(batch)
}

/// 单个 pair：记录转 Read 失败（字母表之外的字符等）时跳过并计数
fn map_records(
    mapper: &ReadPairMapper<'_>,
    a: &FastqRecord,
    b: &FastqRecord,
    stats: &MapStats,
) -> crate::Result<Option<(AlignedSegment, AlignedSegment)>> {
    let reads = a.clone().into_read().and_then(|r1| b.clone().into_read().map(|r2| (r1, r2)));
    match reads {
        Ok((r1, r2)) => mapper.map_pair_counted(&r1, &r2, stats),
        Err(e @ (Error::AlphabetViolation { .. } | Error::InvalidInput(_))) => {
            log::warn!("skipping pair '{}': {}", a.id, e);
            stats.record_skipped();
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// 比对双端 FASTQ 并写出 SAM（`out_path` 为空时写 stdout）。
///
/// 每批 pair 用 rayon 并行比对，结果按输入顺序写出。
pub fn map_paired_fastq(
    index_path: &Path,
    reads1: &Path,
    reads2: &Path,
    out_path: Option<&Path>,
    opt: MapOpt,
    command_line: &str,
) -> Result<MapSummary> {
    opt.validate()?;
    let fm = FMIndex::load_from_file(index_path)
        .with_context(|| format!("cannot load index '{}'", index_path.display()))?;
    let mapper = ReadPairMapper::new(&fm, opt);
    log::info!(
        "loaded index '{}': reference '{}' ({} bp)",
        index_path.display(),
        mapper.rname(),
        mapper.reference_len()
    );

    let mut fq1 = open_fastq(reads1)?;
    let mut fq2 = open_fastq(reads2)?;

    let out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("cannot create '{}'", p.display()))?,
        )),
        None => Box::new(BufWriter::new(std::io::stdout())),
    };
    let mut sam = SamWriter::new(out);
    sam.write_header(mapper.rname(), mapper.reference_len(), command_line)?;

    let pool = rayon::ThreadPoolBuilder::new().num_threads(opt.threads.max(1)).build()?;
    let stats = MapStats::new();

    loop {
        let batch = read_batch(&mut fq1, &mut fq2, opt.batch_size)?;
        if batch.is_empty() {
            break;
        }
        let results: Vec<crate::Result<Option<(AlignedSegment, AlignedSegment)>>> = pool.install(|| {
            batch
                .par_iter()
                .map(|(a, b)| map_records(&mapper, a, b, &stats))
                .collect()
        });
        for res in results {
            if let Some((s1, s2)) = res? {
                sam.write_segment(&s1)?;
                sam.write_segment(&s2)?;
            }
        }
        log::debug!("batch of {} pairs done", batch.len());
    }
    sam.flush()?;

    let summary = stats.snapshot();
    log::info!("{}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::IndexParams;
    use std::io::Cursor;

    #[test]
    fn default_options() {
        let opt = MapOpt::default();
        assert_eq!(opt.kmers_per_read, 5);
        assert_eq!(opt.seed_kmer_size, 26);
        assert_eq!(opt.scoring, Scoring::default());
        assert!(opt.validate().is_ok());
        assert!(MapOpt { seed_kmer_size: 0, ..opt }.validate().is_err());
        assert!(MapOpt { batch_size: 0, ..opt }.validate().is_err());
    }

    #[test]
    fn batches_respect_size_and_names() {
        let fq1 = b"@p1/1\nACGT\n+\nIIII\n@p2/1\nACGT\n+\nIIII\n@p3/1\nACGT\n+\nIIII\n";
        let fq2 = b"@p1/2\nACGT\n+\nIIII\n@p2/2\nACGT\n+\nIIII\n@p3/2\nACGT\n+\nIIII\n";
        let mut r1 = FastqReader::new(Cursor::new(&fq1[..]));
        let mut r2 = FastqReader::new(Cursor::new(&fq2[..]));
        assert_eq!(read_batch(&mut r1, &mut r2, 2).unwrap().len(), 2);
        assert_eq!(read_batch(&mut r1, &mut r2, 2).unwrap().len(), 1);
        assert!(read_batch(&mut r1, &mut r2, 2).unwrap().is_empty());

        let mut r1 = FastqReader::new(Cursor::new(&b"@a/1\nA\n+\nI\n"[..]));
        let mut r2 = FastqReader::new(Cursor::new(&b"@b/2\nA\n+\nI\n"[..]));
        let err = read_batch(&mut r1, &mut r2, 8).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidInput(_))));

        let mut r1 = FastqReader::new(Cursor::new(&b"@a/1\nA\n+\nI\n"[..]));
        let mut r2 = FastqReader::new(Cursor::new(&b""[..]));
        assert!(read_batch(&mut r1, &mut r2, 8).is_err());
    }

    #[test]
    fn bad_records_are_skipped() {
        let index = FMIndex::build(b"ACGTTGCAACGGTACCATGA", IndexParams::default()).unwrap();
        let mapper = ReadPairMapper::new(&index, MapOpt::default());
        let stats = MapStats::new();
        let rec = |id: &str, seq: &[u8]| FastqRecord {
            id: id.to_string(),
            desc: None,
            seq: seq.to_vec(),
            qual: vec![b'I'; seq.len()],
        };
        let out = map_records(&mapper, &rec("x/1", b"ACXT"), &rec("x/2", b"ACGT"), &stats).unwrap();
        assert!(out.is_none());
        assert_eq!(stats.snapshot(), MapSummary { pairs: 1, mapped: 0, unmapped: 0, skipped: 1 });
    }
}
