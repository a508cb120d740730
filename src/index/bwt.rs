use crate::util::dna::SENTINEL_CODE;

/// 根据后缀数组构建 BWT：BWT[i] = text[SA[i]-1]，SA[i]==0 时取哨兵。
pub fn build_bwt(text: &[u8], sa: &[u32]) -> Vec<u8> {
    sa.iter()
        .map(|&p| match p as usize {
            0 => SENTINEL_CODE,
            i => text[i - 1],
        })
        .collect()
}
