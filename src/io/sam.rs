use anyhow::Result;
use std::borrow::Cow;
use std::io::Write;

use crate::align::sw::parse_cigar;

/// SAM FLAG 位
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamFlag(pub u16);

impl SamFlag {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;

    #[inline]
    pub fn contains(self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    #[inline]
    pub fn set(&mut self, bit: u16, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn is_minus_strand(self) -> bool {
        self.contains(Self::REVERSE)
    }

    pub fn is_secondary_alignment(self) -> bool {
        self.contains(Self::SECONDARY)
    }
}

/// 一条 read 的对外放置结果，字段与 SAM 记录一一对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedSegment {
    pub qname: String,
    pub flag: SamFlag,
    pub rname: String,
    /// 1-based
    pub pos: u32,
    pub mapq: u8,
    pub cigar: String,
    pub rnext: String,
    pub pnext: u32,
    pub tlen: i64,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl AlignedSegment {
    /// 比对在参考上的最后一个位置（1-based 闭区间）
    pub fn reference_end(&self) -> u32 {
        let span: usize = parse_cigar(&self.cigar)
            .into_iter()
            .filter(|&(op, _)| matches!(op, 'M' | 'D' | 'N' | '=' | 'X'))
            .map(|(_, len)| len)
            .sum();
        (self.pos as usize + span).saturating_sub(1) as u32
    }

    pub fn to_sam_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.qname,
            self.flag.0,
            self.rname,
            self.pos,
            self.mapq,
            if self.cigar.is_empty() { "*" } else { self.cigar.as_str() },
            self.rnext,
            self.pnext,
            self.tlen,
            String::from_utf8_lossy(&self.seq),
            if self.qual.is_empty() { Cow::Borrowed("*") } else { String::from_utf8_lossy(&self.qual) },
        )
    }
}

pub struct SamWriter<W: Write> {
    out: W,
}

impl<W: Write> SamWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_header(&mut self, rname: &str, rlen: usize, command_line: &str) -> Result<()> {
        writeln!(self.out, "@HD\tVN:1.6\tSO:unsorted")?;
        writeln!(self.out, "@SQ\tSN:{}\tLN:{}", rname, rlen)?;
        writeln!(
            self.out,
            "@PG\tID:{}\tPN:{}\tVN:{}\tCL:{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            command_line
        )?;
        Ok(())
    }

    pub fn write_segment(&mut self, seg: &AlignedSegment) -> Result<()> {
        writeln!(self.out, "{}", seg.to_sam_line())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}
