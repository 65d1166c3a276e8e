use crate::msa::weights::SequenceWeights;
use crate::msa::Alignment;
use crate::util::alphabet::{GAP, SIGMA};

pub type SingleFreq = [f64; SIGMA];
pub type JointFreq = [[f64; SIGMA]; SIGMA];

/// 带权重与伪计数的频率模型
///
/// 单列：P_i(a) = (Σ_k w_k·[s_k[i]=a] + α/|A|) / (W + α)
/// 双列：P_ij(a,b) = (Σ_k w_k·[s_k[i]=a, s_k[j]=b] + α/|A|²) / (W + α)
///
/// 两者共用分母 W + α，保证 Σ_b P_ij(a,b) = P_i(a)。α = 0 时退化为 c / W。
pub struct FrequencyModel<'a> {
    aln: &'a Alignment,
    weights: &'a [f64],
    total: f64,
    pseudocount: f64,
    /// 每列加权计数（未加伪计数）
    counts: Vec<SingleFreq>,
    single: Vec<SingleFreq>,
}

impl<'a> FrequencyModel<'a> {
    pub fn new(aln: &'a Alignment, weights: &'a SequenceWeights, pseudocount: f64) -> Self {
        assert_eq!(aln.n_seqs(), weights.len(), "one weight per sequence");
        let weights = weights.as_slice();
        let total: f64 = weights.iter().sum();

        let mut counts = vec![[0.0; SIGMA]; aln.n_cols()];
        for (row, &w) in aln.rows().zip(weights) {
            for (col, &a) in counts.iter_mut().zip(row) {
                col[a as usize] += w;
            }
        }

        let offset = pseudocount / SIGMA as f64;
        let norm = total + pseudocount;
        let single = counts
            .iter()
            .map(|c| {
                let mut p = [0.0; SIGMA];
                for (pa, &ca) in p.iter_mut().zip(c) {
                    *pa = (ca + offset) / norm;
                }
                p
            })
            .collect();

        Self { aln, weights, total, pseudocount, counts, single }
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.aln.n_cols()
    }

    #[inline]
    pub fn single(&self, i: usize) -> &SingleFreq {
        &self.single[i]
    }

    /// 列对 (i, j) 的联合频率，按需计算（O(N)）
    pub fn joint(&self, i: usize, j: usize) -> JointFreq {
        let mut joint = [[0.0; SIGMA]; SIGMA];
        for (k, &w) in self.weights.iter().enumerate() {
            let a = self.aln.symbol(k, i) as usize;
            let b = self.aln.symbol(k, j) as usize;
            joint[a][b] += w;
        }

        let offset = self.pseudocount / (SIGMA * SIGMA) as f64;
        let norm = self.total + self.pseudocount;
        for row in joint.iter_mut() {
            for p in row.iter_mut() {
                *p = (*p + offset) / norm;
            }
        }
        joint
    }

    /// 加权 gap 频率（不含伪计数）
    pub fn gap_frequency(&self, i: usize) -> f64 {
        self.counts[i][GAP as usize] / self.total
    }

    /// 保守度：最常见符号的加权频率（不含伪计数）
    pub fn conservation(&self, i: usize) -> f64 {
        self.counts[i].iter().copied().fold(0.0, f64::max) / self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Alignment {
        Alignment::from_sequences(&["ACGU-N", "ACGA-N", "UCGA-A", "GCCAUA", "ACCU-G"]).unwrap()
    }

    #[test]
    fn single_frequencies_sum_to_one() {
        let aln = fixture();
        let w = SequenceWeights::from_identity(&aln, 0.8, false);
        for alpha in [0.0, 0.1, 0.5, 1.0, 5.0] {
            let m = FrequencyModel::new(&aln, &w, alpha);
            for i in 0..aln.n_cols() {
                let s: f64 = m.single(i).iter().sum();
                assert!((s - 1.0).abs() < 1e-6, "alpha={} col={} sum={}", alpha, i, s);
            }
        }
    }

    #[test]
    fn joint_sums_to_one_and_marginalizes() {
        let aln = fixture();
        let w = SequenceWeights::uniform(aln.n_seqs());
        for alpha in [0.0, 0.3, 2.0] {
            let m = FrequencyModel::new(&aln, &w, alpha);
            let joint = m.joint(0, 3);
            let total: f64 = joint.iter().flatten().sum();
            assert!((total - 1.0).abs() < 1e-9);
            for a in 0..SIGMA {
                let row: f64 = joint[a].iter().sum();
                assert!((row - m.single(0)[a]).abs() < 1e-12);
                let col: f64 = joint.iter().map(|r| r[a]).sum();
                assert!((col - m.single(3)[a]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn zero_pseudocount_is_maximum_likelihood() {
        let aln = fixture();
        let w = SequenceWeights::uniform(aln.n_seqs());
        let m = FrequencyModel::new(&aln, &w, 0.0);
        let total = w.total();
        // 第 0 列：A A U G A
        let count_a: f64 = w.as_slice()[0] + w.as_slice()[1] + w.as_slice()[4];
        assert_eq!(m.single(0)[0].to_bits(), (count_a / total).to_bits());
        assert_eq!(m.single(0)[1], 0.0);
    }

    #[test]
    fn positive_pseudocount_removes_zeros() {
        let aln = fixture();
        let w = SequenceWeights::uniform(aln.n_seqs());
        let m = FrequencyModel::new(&aln, &w, 0.5);
        assert!(m.single(1).iter().all(|&p| p > 0.0));
        assert!(m.joint(1, 2).iter().flatten().all(|&p| p > 0.0));
    }

    #[test]
    fn gap_and_conservation() {
        let aln = fixture();
        let w = SequenceWeights::uniform(aln.n_seqs());
        let m = FrequencyModel::new(&aln, &w, 0.5);
        assert!((m.gap_frequency(4) - 0.8).abs() < 1e-12);
        assert!((m.conservation(1) - 1.0).abs() < 1e-12);
        assert!((m.conservation(2) - 0.6).abs() < 1e-12);
    }
}
