use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// 后缀数组构建算法
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaStrategy {
    /// 直接比较排序，O(n² log n)，仅用于小输入 / 对照
    Simple,
    /// Manber–Myers 倍增法，O(n log n)
    PrefixDoubling,
    /// Kärkkäinen–Sanders DC3，O(n)
    #[default]
    LinearRecursive,
}

/// 构建后缀数组。
/// 输入为数值化文本，末尾必须是唯一且最小的哨兵（编码 0）。
pub fn build_sa(text: &[u8], strategy: SaStrategy) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![0];
    }
    let sa = match strategy {
        SaStrategy::Simple => simple(text),
        SaStrategy::PrefixDoubling => prefix_doubling(text),
        SaStrategy::LinearRecursive => {
            // 0 留给 DC3 的尾部填充
            let mut s: Vec<usize> = text.iter().map(|&b| b as usize + 1).collect();
            let k = s.iter().copied().max().unwrap_or(0);
            s.extend_from_slice(&[0, 0, 0]);
            let mut sa = vec![0usize; n];
            dc3(&s, &mut sa, n, k);
            sa
        }
    };
    sa.into_iter().map(|x| x as u32).collect()
}

fn simple(text: &[u8]) -> Vec<usize> {
    let mut suffixes: Vec<(&[u8], usize)> = (0..text.len()).map(|i| (&text[i..], i)).collect();
    suffixes.sort_unstable();
    suffixes.into_iter().map(|(_, i)| i).collect()
}

/// 循环移位上的倍增排序；哨兵唯一且最小时，循环移位次序等于后缀次序。
fn prefix_doubling(text: &[u8]) -> Vec<usize> {
    let n = text.len();

    // 按单字符计数排序
    let mut count = [0usize; 256];
    for &c in text {
        count[c as usize] += 1;
    }
    for c in 1..256 {
        count[c] += count[c - 1];
    }
    let mut order = vec![0usize; n];
    for i in (0..n).rev() {
        let c = text[i] as usize;
        count[c] -= 1;
        order[count[c]] = i;
    }

    let mut classes = vec![0usize; n];
    for i in 1..n {
        let same = text[order[i]] == text[order[i - 1]];
        classes[order[i]] = classes[order[i - 1]] + usize::from(!same);
    }

    let mut step = 1usize;
    let mut new_order = vec![0usize; n];
    let mut new_classes = vec![0usize; n];
    let mut bucket = vec![0usize; n];
    while step < n {
        if classes[order[n - 1]] == n - 1 {
            break;
        }

        // order 已按前 step 个字符有序；左移 step 后按前半段类别稳定计数排序
        bucket.iter_mut().for_each(|v| *v = 0);
        for &cl in &classes {
            bucket[cl] += 1;
        }
        for j in 1..n {
            bucket[j] += bucket[j - 1];
        }
        for i in (0..n).rev() {
            let start = (order[i] + n - step) % n;
            let cl = classes[start];
            bucket[cl] -= 1;
            new_order[bucket[cl]] = start;
        }

        new_classes[new_order[0]] = 0;
        for i in 1..n {
            let cur = new_order[i];
            let prev = new_order[i - 1];
            let differ = classes[cur] != classes[prev]
                || classes[(cur + step) % n] != classes[(prev + step) % n];
            new_classes[cur] = new_classes[prev] + usize::from(differ);
        }

        std::mem::swap(&mut order, &mut new_order);
        std::mem::swap(&mut classes, &mut new_classes);
        step <<= 1;
    }
    order
}

#[inline]
fn leq2(a1: usize, a2: usize, b1: usize, b2: usize) -> bool {
    (a1, a2).cmp(&(b1, b2)) != Ordering::Greater
}

#[inline]
fn leq3(a1: usize, a2: usize, a3: usize, b1: usize, b2: usize, b3: usize) -> bool {
    (a1, a2, a3).cmp(&(b1, b2, b3)) != Ordering::Greater
}

/// 稳定计数排序：按 keys[src[i]] 将 src 的前 n 项写入 dst
fn radix_pass(src: &[usize], dst: &mut [usize], keys: &[usize], n: usize, k: usize) {
    let mut count = vec![0usize; k + 1];
    for &a in &src[..n] {
        count[keys[a]] += 1;
    }
    let mut sum = 0usize;
    for c in count.iter_mut() {
        let t = *c;
        *c = sum;
        sum += t;
    }
    for &a in &src[..n] {
        let key = keys[a];
        dst[count[key]] = a;
        count[key] += 1;
    }
}

/// DC3：s 长度为 n+3，取值 1..=k，末尾三个 0 作填充；结果写入 sa[..n]。
fn dc3(s: &[usize], sa: &mut [usize], n: usize, k: usize) {
    let n0 = (n + 2) / 3;
    let n1 = (n + 1) / 3;
    let n2 = n / 3;
    let n02 = n0 + n2;

    let mut s12 = vec![0usize; n02 + 3];
    let mut sa12 = vec![0usize; n02 + 3];
    let mut s0 = vec![0usize; n0];
    let mut sa0 = vec![0usize; n0];

    // n % 3 == 1 时额外放入位置 n 作为哑后缀
    let mut j = 0;
    for i in 0..n + (n0 - n1) {
        if i % 3 != 0 {
            s12[j] = i;
            j += 1;
        }
    }

    // 对 mod-{1,2} 三元组做三趟基数排序
    radix_pass(&s12, &mut sa12, &s[2..], n02, k);
    radix_pass(&sa12, &mut s12, &s[1..], n02, k);
    radix_pass(&s12, &mut sa12, s, n02, k);

    let mut name = 0usize;
    let mut last: Option<(usize, usize, usize)> = None;
    for i in 0..n02 {
        let p = sa12[i];
        let triple = (s[p], s[p + 1], s[p + 2]);
        if last != Some(triple) {
            name += 1;
            last = Some(triple);
        }
        if p % 3 == 1 {
            s12[p / 3] = name;
        } else {
            s12[p / 3 + n0] = name;
        }
    }

    if name < n02 {
        // 名字不唯一，在缩减串上递归
        dc3(&s12, &mut sa12, n02, name);
        for i in 0..n02 {
            s12[sa12[i]] = i + 1;
        }
    } else {
        for i in 0..n02 {
            sa12[s12[i] - 1] = i;
        }
    }

    let mut j = 0;
    for &p in &sa12[..n02] {
        if p < n0 {
            s0[j] = 3 * p;
            j += 1;
        }
    }
    radix_pass(&s0, &mut sa0, s, n0, k);

    let pos12 = |t: usize| -> usize {
        if sa12[t] < n0 {
            sa12[t] * 3 + 1
        } else {
            (sa12[t] - n0) * 3 + 2
        }
    };

    let mut p = 0usize;
    let mut t = n0 - n1;
    let mut k_out = 0usize;
    while k_out < n {
        let i = pos12(t);
        let j = sa0[p];
        let take12 = if sa12[t] < n0 {
            leq2(s[i], s12[sa12[t] + n0], s[j], s12[j / 3])
        } else {
            leq3(s[i], s[i + 1], s12[sa12[t] - n0 + 1], s[j], s[j + 1], s12[j / 3 + n0])
        };
        if take12 {
            sa[k_out] = i;
            t += 1;
            if t == n02 {
                k_out += 1;
                while p < n0 {
                    sa[k_out] = sa0[p];
                    p += 1;
                    k_out += 1;
                }
            }
        } else {
            sa[k_out] = j;
            p += 1;
            if p == n0 {
                k_out += 1;
                while t < n02 {
                    sa[k_out] = pos12(t);
                    t += 1;
                    k_out += 1;
                }
            }
        }
        k_out += 1;
    }
}
