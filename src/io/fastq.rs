use anyhow::{anyhow, Result};
use std::io::BufRead;

use super::read::Read;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl FastqRecord {
    /// 转为比对用的 Read；字母表之外的字符在这里报错
    pub fn into_read(self) -> crate::Result<Read> {
        Read::new(self.id, &self.seq, &self.qual)
    }
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    line_no: usize,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, line_no: 0 }
    }

    fn read_line(&mut self) -> Result<usize> {
        self.buf.clear();
        let n = self.reader.read_line(&mut self.buf)?;
        if n > 0 {
            self.line_no += 1;
        }
        Ok(n)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done { return Ok(None); }

        // header line starting with '@'; skip blank lines between records
        loop {
            if self.read_line()? == 0 {
                self.done = true;
                return Ok(None);
            }
            if !self.buf.trim().is_empty() { break; }
        }
        if !self.buf.starts_with('@') {
            return Err(anyhow!("line {}: FASTQ header not starting with '@'", self.line_no));
        }
        let header = self.buf[1..].trim_end().to_string();
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        // sequence line
        if self.read_line()? == 0 { return Err(anyhow!("unexpected EOF after header of '{}'", id)); }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        // plus line
        if self.read_line()? == 0 || !self.buf.starts_with('+') {
            return Err(anyhow!("line {}: missing '+' line for '{}'", self.line_no, id));
        }

        // quality line
        if self.read_line()? == 0 { return Err(anyhow!("missing quality line for '{}'", id)); }
        let qual = self.buf.trim_end().as_bytes().to_vec();

        // line-wrapped seq not supported here
        if qual.len() != seq.len() {
            return Err(anyhow!("'{}': seq/qual length mismatch ({} vs {})", id, seq.len(), qual.len()));
        }

        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
