//! 与外部文件格式的边界：FASTA / FASTQ 读取，SAM 写出

pub mod fasta;
pub mod fastq;
pub mod read;
pub mod sam;

pub use read::{mate_names_match, template_name, Read, Strand};
pub use sam::{AlignedSegment, SamFlag, SamWriter};
