use rayon::prelude::*;

use super::freq::{FrequencyModel, JointFreq, SingleFreq};
use crate::util::alphabet::SIGMA;
use crate::util::matrix::SquareMatrix;

/// 单个列对的互信息（以 2 为底）
///
/// 只累加 P(a,b) > 0 的项；任一边缘概率为 0 的项直接跳过。
#[inline]
pub fn pair_mi(p_i: &SingleFreq, p_j: &SingleFreq, joint: &JointFreq) -> f64 {
    let mut mi = 0.0;
    for a in 0..SIGMA {
        let pa = p_i[a];
        if pa <= 0.0 {
            continue;
        }
        for b in 0..SIGMA {
            let pb = p_j[b];
            let pab = joint[a][b];
            if pb <= 0.0 || pab <= 0.0 {
                continue;
            }
            mi += pab * (pab / (pa * pb)).log2();
        }
    }
    mi
}

/// 计算完整的 MI 矩阵（对称，对角线为 0）。
///
/// `active[i] == false` 的列不参与打分，整行整列保持为 0。
/// 每一行作为独立任务计算 j > i 的部分，最后顺序写回，每个单元格只写一次。
pub fn mi_matrix(model: &FrequencyModel<'_>, active: &[bool], parallel: bool) -> SquareMatrix {
    let n = model.n_cols();
    assert_eq!(active.len(), n);

    let score_row = |i: usize| -> Vec<f64> {
        if !active[i] {
            return vec![0.0; n - i - 1];
        }
        ((i + 1)..n)
            .map(|j| {
                if !active[j] {
                    return 0.0;
                }
                let joint = model.joint(i, j);
                pair_mi(model.single(i), model.single(j), &joint)
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = if parallel {
        (0..n).into_par_iter().map(score_row).collect()
    } else {
        (0..n).map(score_row).collect()
    };

    let mut mi = SquareMatrix::zeros(n);
    for (i, row) in rows.into_iter().enumerate() {
        for (offset, v) in row.into_iter().enumerate() {
            mi.set_sym(i, i + 1 + offset, v);
        }
    }
    mi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msa::weights::SequenceWeights;
    use crate::msa::Alignment;
    use std::collections::HashMap;

    /// 未加权、无伪计数的原始公式（按字符计数）
    fn reference_mi(seqs: &[&str], i: usize, j: usize) -> f64 {
        let n = seqs.len() as f64;
        let col = |c: usize| -> Vec<u8> { seqs.iter().map(|s| s.as_bytes()[c]).collect() };
        let (ci, cj) = (col(i), col(j));
        let mut count_i: HashMap<u8, f64> = HashMap::new();
        let mut count_j: HashMap<u8, f64> = HashMap::new();
        let mut count_ij: HashMap<(u8, u8), f64> = HashMap::new();
        for (&a, &b) in ci.iter().zip(&cj) {
            *count_i.entry(a).or_default() += 1.0;
            *count_j.entry(b).or_default() += 1.0;
            *count_ij.entry((a, b)).or_default() += 1.0;
        }
        let mut mi = 0.0;
        for ((a, b), c) in count_ij {
            let pab = c / n;
            let pa = count_i[&a] / n;
            let pb = count_j[&b] / n;
            mi += pab * (pab / (pa * pb)).log2();
        }
        mi
    }

    const SPARSE: [&str; 6] = [
        "GACUAGCU", "GACGAUCU", "GAUCAGAU", "GCAUACGU", "GAUUAGCU", "GGCAAUCU",
    ];

    fn score(seqs: &[&str], alpha: f64, parallel: bool) -> SquareMatrix {
        let aln = Alignment::from_sequences(seqs).unwrap();
        let w = SequenceWeights::uniform(aln.n_seqs());
        let model = FrequencyModel::new(&aln, &w, alpha);
        mi_matrix(&model, &vec![true; aln.n_cols()], parallel)
    }

    #[test]
    fn perfect_covariation_equals_entropy() {
        // 两列完全共变，各有 4 种等频符号 => MI = 2 bit
        let seqs = ["AU", "UA", "GC", "CG"];
        let mi = score(&seqs, 0.0, false);
        assert!((mi.get(0, 1) - 2.0).abs() < 1e-12);
        assert_eq!(mi.get(0, 0), 0.0);
    }

    #[test]
    fn zero_pseudocount_matches_unregularized_formula() {
        let mi = score(&SPARSE, 0.0, false);
        for (i, j, v) in mi.upper_triangle() {
            assert!((v - reference_mi(&SPARSE, i, j)).abs() < 1e-12, "({}, {})", i, j);
        }
    }

    #[test]
    fn symmetric_and_parallel_safe() {
        let seq = score(&SPARSE, 0.5, false);
        let par = score(&SPARSE, 0.5, true);
        assert!(seq.is_symmetric());
        assert_eq!(seq, par);
    }

    #[test]
    fn nonzero_fraction_grows_with_pseudocount() {
        let fraction = |alpha: f64| {
            let mi = score(&SPARSE, alpha, false);
            let total = mi.upper_triangle().count() as f64;
            mi.upper_triangle().filter(|&(_, _, v)| v > 1e-10).count() as f64 / total
        };
        let fractions: Vec<f64> = [0.0, 0.1, 0.5, 1.0].iter().map(|&a| fraction(a)).collect();
        assert!(fractions[0] < 1.0);
        for w in fractions.windows(2) {
            assert!(w[0] <= w[1], "{:?}", fractions);
        }
    }

    #[test]
    fn inactive_columns_stay_zero() {
        let aln = Alignment::from_sequences(&SPARSE).unwrap();
        let w = SequenceWeights::uniform(aln.n_seqs());
        let model = FrequencyModel::new(&aln, &w, 0.5);
        let mut active = vec![true; aln.n_cols()];
        active[2] = false;
        let mi = mi_matrix(&model, &active, true);
        assert!(mi.row(2).iter().all(|&v| v == 0.0));
        assert!(mi.get(0, 1) > 0.0);
    }

    #[test]
    fn absent_symbols_do_not_produce_nan() {
        let mi = score(&["AAAA", "AAAA", "AAAC"], 0.0, false);
        assert!(mi.as_slice().iter().all(|v| v.is_finite()));
    }
}
