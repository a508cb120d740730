use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 打分：四种操作各自的得分（加到单元格上，罚分为负数）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoring {
    pub match_score: i32,
    pub mismatch: i32,
    pub insertion: i32,
    pub deletion: i32,
}

impl Default for Scoring {
    fn default() -> Self {
        Self { match_score: 1, mismatch: -1, insertion: -2, deletion: -2 }
    }
}

impl Scoring {
    /// 由 `{'=': .., 'X': .., 'I': .., 'D': ..}` 构造，缺任何一项都报错
    pub fn from_costs(costs: &HashMap<char, i32>) -> Result<Self> {
        let get = |key: char| {
            costs
                .get(&key)
                .copied()
                .ok_or_else(|| Error::invalid(format!("scoring is missing the cost for '{}'", key)))
        };
        Ok(Self {
            match_score: get('=')?,
            mismatch: get('X')?,
            insertion: get('I')?,
            deletion: get('D')?,
        })
    }
}

impl FromStr for Scoring {
    type Err = Error;

    /// `match=1,mismatch=-1,insertion=-2,deletion=-2`，也接受 `=`/`X`/`I`/`D` 作键
    fn from_str(s: &str) -> Result<Self> {
        let mut costs = HashMap::new();
        for item in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (key, value) = item
                .rsplit_once(|c: char| c == ':' || c == '=')
                .ok_or_else(|| Error::invalid(format!("malformed scoring entry '{}'", item)))?;
            let op = match key.trim() {
                "=" | "match" => '=',
                "X" | "mismatch" => 'X',
                "I" | "insertion" => 'I',
                "D" | "deletion" => 'D',
                other => return Err(Error::invalid(format!("unknown scoring operation '{}'", other))),
            };
            let cost: i32 = value
                .trim()
                .parse()
                .map_err(|_| Error::invalid(format!("cost for '{}' is not an integer", key.trim())))?;
            costs.insert(op, cost);
        }
        Scoring::from_costs(&costs)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlignMode {
    /// Smith–Waterman：得分在 0 处截断
    #[default]
    Local,
    /// query 端到端、参考两端免费：不截断，允许比对延伸到窗口边缘
    SemiLocal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EditOp {
    Equal,
    Mismatch,
    /// query 多出的碱基
    Insertion,
    /// 参考多出的碱基
    Deletion,
}

impl EditOp {
    pub fn symbol(self) -> char {
        match self {
            EditOp::Equal => '=',
            EditOp::Mismatch => 'X',
            EditOp::Insertion => 'I',
            EditOp::Deletion => 'D',
        }
    }

    /// SAM CIGAR 中 `=`/`X` 合并为 `M`
    pub fn cigar_symbol(self) -> char {
        match self {
            EditOp::Equal | EditOp::Mismatch => 'M',
            op => op.symbol(),
        }
    }

    fn consumes_ref(self) -> bool {
        !matches!(self, EditOp::Insertion)
    }
}

/// 一次回溯的结果，坐标均为 0-based 半开区间（相对于传入的参考窗口 / query）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub score: i32,
    pub ref_start: usize,
    pub ref_end: usize,
    pub query_start: usize,
    pub query_end: usize,
    /// 游程编码的编辑脚本
    pub script: Vec<(EditOp, usize)>,
    /// edit distance
    pub nm: u32,
}

impl Alignment {
    pub fn cigar(&self) -> String {
        let ops: Vec<char> = self
            .script
            .iter()
            .flat_map(|&(op, len)| std::iter::repeat(op.cigar_symbol()).take(len))
            .collect();
        ops_to_cigar(&ops)
    }

    /// 在未比对上的 read 两端补软剪切，使 CIGAR 覆盖整条 read
    pub fn cigar_with_clips(&self, query_len: usize) -> String {
        let mut cigar = String::new();
        if self.query_start > 0 {
            let _ = write!(&mut cigar, "{}S", self.query_start);
        }
        cigar.push_str(&self.cigar());
        let tail = query_len.saturating_sub(self.query_end);
        if tail > 0 {
            let _ = write!(&mut cigar, "{}S", tail);
        }
        cigar
    }

    /// 参考上覆盖的长度
    pub fn ref_span(&self) -> usize {
        self.ref_end - self.ref_start
    }

    /// 完全匹配的参考片段，每段为 1-based 闭区间 (first, last)。
    /// 注意与 `ref_start`/`ref_end` 的 0-based 半开区间不同：一段 (f, l) 对应参考切片 `[f - 1, l)`。
    pub fn matching_subsegments(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut pos = self.ref_start;
        for &(op, len) in &self.script {
            if op == EditOp::Equal {
                out.push((pos + 1, pos + len));
            }
            if op.consumes_ref() {
                pos += len;
            }
        }
        out
    }
}

/// (|ref|+1) x (|query|+1) 打分矩阵，行对应参考
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<i32>,
}

impl ScoreMatrix {
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> i32 {
        self.cells[i * self.cols + j]
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn max(&self) -> i32 {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    pub fn to_rows(&self) -> Vec<Vec<i32>> {
        self.cells.chunks(self.cols).map(<[i32]>::to_vec).collect()
    }
}

// 回溯方向
const STOP: u8 = 0;
const DIAG: u8 = 1;
const UP: u8 = 2;
const LEFT: u8 = 3;

struct Dp {
    h: ScoreMatrix,
    dir: Vec<u8>,
}

/// 单元格得分相同时按 对角 > 上 > 左 的顺序选择前驱，保证回溯可复现
#[derive(Clone, Copy, Debug, Default)]
pub struct SmithWaterman {
    pub scoring: Scoring,
}

impl SmithWaterman {
    pub fn new(scoring: Scoring) -> Self {
        Self { scoring }
    }

    pub fn scoring_matrix<T: PartialEq>(&self, reference: &[T], query: &[T], mode: AlignMode) -> ScoreMatrix {
        self.fill(reference, query, mode).h
    }

    /// 返回每个最大得分起点对应的一条比对（按行优先顺序惰性回溯）
    pub fn align<'a, T: PartialEq>(
        &self,
        reference: &'a [T],
        query: &'a [T],
        mode: AlignMode,
    ) -> Alignments<'a, T> {
        let dp = self.fill(reference, query, mode);
        let origins = find_origins(&dp.h, mode);
        Alignments { reference, query, dp, origins: origins.into_iter() }
    }

    fn fill<T: PartialEq>(&self, reference: &[T], query: &[T], mode: AlignMode) -> Dp {
        let p = self.scoring;
        let n = reference.len();
        let m = query.len();
        let rows = n + 1;
        let cols = m + 1;
        let mut h = vec![0i32; rows * cols];
        let mut dir = vec![STOP; rows * cols];

        if mode == AlignMode::SemiLocal {
            // query 前缀未对上参考时按插入计分；参考前缀免费
            for j in 1..cols {
                h[j] = h[j - 1] + p.insertion;
                dir[j] = LEFT;
            }
        }

        for i in 1..rows {
            for j in 1..cols {
                let idx = i * cols + j;
                let subst = if reference[i - 1] == query[j - 1] { p.match_score } else { p.mismatch };
                let diag = h[idx - cols - 1] + subst;
                let up = h[idx - cols] + p.deletion;
                let left = h[idx - 1] + p.insertion;

                let (mut val, mut d) = (diag, DIAG);
                if up > val {
                    val = up;
                    d = UP;
                }
                if left > val {
                    val = left;
                    d = LEFT;
                }
                if mode == AlignMode::Local && val <= 0 {
                    val = 0;
                    d = STOP;
                }
                h[idx] = val;
                dir[idx] = d;
            }
        }

        Dp { h: ScoreMatrix { rows, cols, cells: h }, dir }
    }
}

fn find_origins(h: &ScoreMatrix, mode: AlignMode) -> Vec<(usize, usize)> {
    match mode {
        AlignMode::Local => {
            let best = h.max();
            if best <= 0 {
                return Vec::new();
            }
            (0..h.rows)
                .flat_map(|i| (0..h.cols).map(move |j| (i, j)))
                .filter(|&(i, j)| h.get(i, j) == best)
                .collect()
        }
        AlignMode::SemiLocal => {
            let last = h.cols - 1;
            if last == 0 {
                return Vec::new();
            }
            let best = (0..h.rows).map(|i| h.get(i, last)).max().unwrap_or(0);
            (0..h.rows).filter(|&i| h.get(i, last) == best).map(|i| (i, last)).collect()
        }
    }
}

/// [`SmithWaterman::align`] 返回的惰性迭代器
pub struct Alignments<'a, T> {
    reference: &'a [T],
    query: &'a [T],
    dp: Dp,
    origins: std::vec::IntoIter<(usize, usize)>,
}

impl<'a, T: PartialEq> Alignments<'a, T> {
    pub fn matrix(&self) -> &ScoreMatrix {
        &self.dp.h
    }

    fn traceback(&self, origin: (usize, usize)) -> Alignment {
        let cols = self.dp.h.cols;
        let (mut i, mut j) = origin;
        let mut ops: Vec<EditOp> = Vec::new();
        loop {
            let d = self.dp.dir[i * cols + j];
            match d {
                DIAG => {
                    let op = if self.reference[i - 1] == self.query[j - 1] {
                        EditOp::Equal
                    } else {
                        EditOp::Mismatch
                    };
                    ops.push(op);
                    i -= 1;
                    j -= 1;
                }
                UP => {
                    ops.push(EditOp::Deletion);
                    i -= 1;
                }
                LEFT => {
                    ops.push(EditOp::Insertion);
                    j -= 1;
                }
                _ => break,
            }
        }
        ops.reverse();

        let nm = ops.iter().filter(|&&op| op != EditOp::Equal).count() as u32;
        Alignment {
            score: self.dp.h.get(origin.0, origin.1),
            ref_start: i,
            ref_end: origin.0,
            query_start: j,
            query_end: origin.1,
            script: run_length(&ops),
            nm,
        }
    }
}

impl<'a, T: PartialEq> Iterator for Alignments<'a, T> {
    type Item = Alignment;

    fn next(&mut self) -> Option<Alignment> {
        let origin = self.origins.next()?;
        Some(self.traceback(origin))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.origins.size_hint()
    }
}

fn run_length(ops: &[EditOp]) -> Vec<(EditOp, usize)> {
    let mut out: Vec<(EditOp, usize)> = Vec::new();
    for &op in ops {
        match out.last_mut() {
            Some((last, len)) if *last == op => *len += 1,
            _ => out.push((op, 1)),
        }
    }
    out
}

pub fn ops_to_cigar(ops: &[char]) -> String {
    let mut cigar = String::new();
    if ops.is_empty() {
        return cigar;
    }
    let mut cur = ops[0];
    let mut len = 1usize;
    for &op in &ops[1..] {
        if op == cur {
            len += 1;
        } else {
            let _ = write!(&mut cigar, "{}{}", len, cur);
            cur = op;
            len = 1;
        }
    }
    let _ = write!(&mut cigar, "{}{}", len, cur);
    cigar
}

pub fn parse_cigar(cigar: &str) -> Vec<(char, usize)> {
    let mut result = Vec::new();
    let mut num = 0usize;
    for ch in cigar.chars() {
        if ch.is_ascii_digit() {
            num = num * 10 + (ch as usize - '0' as usize);
        } else {
            if num > 0 {
                result.push((ch, num));
            }
            num = 0;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scoring() -> Scoring {
        Scoring { match_score: 1, mismatch: -1, insertion: -2, deletion: -2 }
    }

    #[test]
    fn reproduces_known_scoring_matrix() {
        let sw = SmithWaterman::new(test_scoring());
        let h = sw.scoring_matrix(b"ATGGCCTC", b"ACGGCTC", AlignMode::Local);
        let expected = vec![
            vec![0, 0, 0, 0, 0, 0, 0, 0],
            vec![0, 1, 0, 0, 0, 0, 0, 0],
            vec![0, 0, 0, 0, 0, 0, 1, 0],
            vec![0, 0, 0, 1, 1, 0, 0, 0],
            vec![0, 0, 0, 1, 2, 0, 0, 0],
            vec![0, 0, 1, 0, 0, 3, 1, 1],
            vec![0, 0, 1, 0, 0, 1, 2, 2],
            vec![0, 0, 0, 0, 0, 0, 2, 1],
            vec![0, 0, 1, 0, 0, 1, 0, 3],
        ];
        assert_eq!(h.to_rows(), expected);
        assert_eq!(h.max(), 3);
        assert_eq!(h.get(5, 5), 3);
    }

    #[test]
    fn first_alignment_matching_segments() {
        let sw = SmithWaterman::new(test_scoring());
        let all: Vec<Alignment> = sw.align(b"ATGGCCTC", b"ACGGCTC", AlignMode::Local).collect();
        // 两个最大值起点：(5,5) 与 (8,7)
        assert_eq!(all.len(), 2);
        let first = &all[0];
        assert_eq!(first.score, 3);
        assert_eq!(first.matching_subsegments(), vec![(3, 5)]);
        assert_eq!((first.ref_start, first.ref_end), (2, 5));
        // 全匹配时唯一一段恰好是 (ref_start + 1, ref_end)
        assert_eq!(first.matching_subsegments()[0], (first.ref_start + 1, first.ref_end));
        assert_eq!((first.query_start, first.query_end), (2, 5));
        assert_eq!(first.cigar(), "3M");

        // 对角优先：(6,5) 处不走删除
        let second = &all[1];
        assert_eq!((second.ref_start, second.ref_end), (5, 8));
        assert_eq!((second.query_start, second.query_end), (4, 7));
    }

    #[test]
    fn local_offsets() {
        let sw = SmithWaterman::default();
        let a = sw.align(b"ABCDEFG", b"CDE", AlignMode::Local).next().unwrap();
        assert_eq!(a.query_start, 0);
        assert_eq!(a.ref_start, 2);
        assert_eq!(a.cigar(), "3M");
        assert_eq!(a.nm, 0);

        let a = sw.align(b"AB", b"A", AlignMode::Local).next().unwrap();
        assert_eq!(a.score, 1);
    }

    #[test]
    fn semi_local_keeps_query_start() {
        let sw = SmithWaterman::default();
        let a = sw.align(b"ABCDEFG", b"ZBCDE", AlignMode::SemiLocal).next().unwrap();
        assert_eq!(a.query_start, 0);
        assert_eq!(a.query_end, 5);
        assert_eq!(a.ref_start, 0);
        assert_eq!(a.score, 3);
        assert_eq!(a.cigar(), "5M");
        assert_eq!(a.nm, 1);

        // 局部模式会剪掉 Z
        let l = sw.align(b"ABCDEFG", b"ZBCDE", AlignMode::Local).next().unwrap();
        assert_eq!(l.query_start, 1);
        assert_eq!(l.cigar_with_clips(5), "1S4M");
    }

    #[test]
    fn semi_local_is_not_clamped() {
        let sw = SmithWaterman::default();
        let h = sw.scoring_matrix(b"AC", b"GT", AlignMode::SemiLocal);
        assert_eq!(h.get(0, 2), -4);
        assert!(h.to_rows().iter().flatten().any(|&v| v < 0));
        let a = sw.align(b"AC", b"GT", AlignMode::SemiLocal).next().unwrap();
        assert_eq!(a.query_start, 0);
        assert_eq!(a.query_end, 2);
    }

    #[test]
    fn works_on_integer_sequences() {
        let sw = SmithWaterman::default();
        let reference = "ABCDEFG";
        let query = "CDE";
        let a1: Vec<String> = sw.align(reference.as_bytes(), query.as_bytes(), AlignMode::Local).map(|a| a.cigar()).collect();
        let r: Vec<i64> = reference.chars().map(|c| c as i64).collect();
        let q: Vec<i64> = query.chars().map(|c| c as i64).collect();
        let a2: Vec<String> = sw.align(&r, &q, AlignMode::Local).map(|a| a.cigar()).collect();
        assert_eq!(a1, a2);
    }

    #[test]
    fn indels_in_script() {
        let sw = SmithWaterman::new(Scoring { match_score: 2, mismatch: -3, insertion: -2, deletion: -2 });
        let a = sw.align(b"ACGTTTACGT", b"ACGTACGT", AlignMode::Local).next().unwrap();
        // ACG--TACGT 与 ACGT--ACGT 同分，对角优先得到前者
        assert_eq!(a.cigar(), "3M2D5M");
        assert_eq!(a.score, 12);
        assert_eq!(a.ref_span(), 10);
        assert_eq!(a.nm, 2);
        assert_eq!(a.matching_subsegments(), vec![(1, 3), (6, 10)]);

        let b = sw.align(b"ACGTACGT", b"ACGTTTACGT", AlignMode::Local).next().unwrap();
        assert_eq!(b.cigar(), "3M2I5M");
        assert_eq!(b.ref_span(), 8);
    }

    #[test]
    fn no_alignment_for_disjoint_inputs() {
        let sw = SmithWaterman::default();
        assert_eq!(sw.align(b"AAAA", b"CCCC", AlignMode::Local).count(), 0);
        assert_eq!(sw.align(b"", b"ACGT", AlignMode::Local).count(), 0);
        assert_eq!(sw.align(b"ACGT", b"", AlignMode::SemiLocal).count(), 0);
    }

    #[test]
    fn scoring_from_costs() {
        let mut costs: HashMap<char, i32> = [('=', 1), ('X', -1), ('I', -2)].into_iter().collect();
        assert!(matches!(Scoring::from_costs(&costs), Err(Error::InvalidInput(_))));
        costs.insert('D', -2);
        assert_eq!(Scoring::from_costs(&costs).unwrap(), test_scoring());
    }

    #[test]
    fn scoring_from_str() {
        let s: Scoring = "match=2,mismatch=-3,insertion=-4,deletion=-5".parse().unwrap();
        assert_eq!(s, Scoring { match_score: 2, mismatch: -3, insertion: -4, deletion: -5 });
        let s: Scoring = "=:1, X:-1, I:-2, D:-2".parse().unwrap();
        assert_eq!(s, test_scoring());
        assert!("match=1,mismatch=-1".parse::<Scoring>().is_err());
        assert!("match=one".parse::<Scoring>().is_err());
        assert!("gap=1".parse::<Scoring>().is_err());
    }

    #[test]
    fn cigar_helpers() {
        assert_eq!(ops_to_cigar(&['M', 'M', 'I', 'M']), "2M1I1M");
        assert_eq!(parse_cigar("3S10M2D5M"), vec![('S', 3), ('M', 10), ('D', 2), ('M', 5)]);
    }
}
