use crate::error::{Error, Result};

/// 字母表大小：{0:$, 1:A, 2:C, 3:G, 4:N, 5:T}
/// 编码顺序即字典序，哨兵最小。
pub const SIGMA: usize = 6;
pub const SENTINEL: u8 = b'$';
pub const SENTINEL_CODE: u8 = 0;

/// 编码 → ASCII
pub const SYMBOLS: [u8; SIGMA] = [b'$', b'A', b'C', b'G', b'N', b'T'];

#[inline]
pub fn to_alphabet(b: u8) -> Option<u8> {
    match b.to_ascii_uppercase() {
        b'$' => Some(0),
        b'A' => Some(1),
        b'C' => Some(2),
        b'G' => Some(3),
        b'N' => Some(4),
        b'T' => Some(5),
        _ => None,
    }
}

#[inline]
pub fn from_alphabet(a: u8) -> u8 {
    SYMBOLS.get(a as usize).copied().unwrap_or(b'N')
}

/// 将碱基序列编码为字母表编码（不接受哨兵），大小写不敏感。
pub fn encode(seq: &[u8]) -> Result<Vec<u8>> {
    seq.iter()
        .enumerate()
        .map(|(position, &b)| match to_alphabet(b) {
            Some(code) if code != SENTINEL_CODE => Ok(code),
            _ => Err(Error::AlphabetViolation { symbol: b as char, position }),
        })
        .collect()
}

pub fn decode(codes: &[u8]) -> Vec<u8> {
    codes.iter().map(|&a| from_alphabet(a)).collect()
}

/// 转大写并校验字母表
pub fn normalize_seq(seq: &[u8]) -> Result<Vec<u8>> {
    encode(seq).map(|codes| decode(&codes))
}

#[inline]
pub fn complement(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        _ => b'N',
    }
}

pub fn revcomp(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}
