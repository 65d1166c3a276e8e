use rayon::prelude::*;

use super::Alignment;
use crate::error::{CovarError, Result};
use crate::util::alphabet;

/// 序列权重：归一化后总和为 1.0，并记录有效序列数 Neff。
///
/// 基于相似度的权重中，Neff = Σ 原始权重 = Σ 1/|相似邻居|，
/// 因此 N 条完全相同的序列 Neff = 1；调用方直接给出的权重
/// 使用 Kish 有效样本量 (Σw)² / Σw²。两者都满足 1 ≤ Neff ≤ N。
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceWeights {
    weights: Vec<f64>,
    effective_n: f64,
}

impl SequenceWeights {
    pub fn uniform(n: usize) -> Self {
        assert!(n > 0, "cannot weight an empty alignment");
        Self { weights: vec![1.0 / n as f64; n], effective_n: n as f64 }
    }

    /// 冗余降权：与 k 相似度超过阈值的序列（包括 k 自身）个数的倒数
    pub fn from_identity(aln: &Alignment, threshold: f64, parallel: bool) -> Self {
        let n = aln.n_seqs();
        let neighbours = |k: usize| -> usize {
            let row_k = aln.row(k);
            1 + (0..n)
                .filter(|&j| j != k && pairwise_identity(row_k, aln.row(j)) > threshold)
                .count()
        };

        let raw: Vec<f64> = if parallel {
            (0..n).into_par_iter().map(|k| 1.0 / neighbours(k) as f64).collect()
        } else {
            (0..n).map(|k| 1.0 / neighbours(k) as f64).collect()
        };

        let effective_n: f64 = raw.iter().sum();
        let weights = raw.iter().map(|w| w / effective_n).collect();
        Self { weights, effective_n }
    }

    /// 调用方给定的权重：长度需为 N，有限、非负且总和为正
    pub fn from_values(values: &[f64], n_seqs: usize) -> Result<Self> {
        if values.len() != n_seqs {
            return Err(CovarError::InvalidInput(format!(
                "got {} weights for {} sequences",
                values.len(),
                n_seqs
            )));
        }
        if let Some(bad) = values.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(CovarError::InvalidInput(format!("invalid sequence weight {}", bad)));
        }
        let total: f64 = values.iter().sum();
        if total <= 0.0 {
            return Err(CovarError::InvalidInput("sequence weights sum to zero".into()));
        }

        let weights: Vec<f64> = values.iter().map(|w| w / total).collect();
        let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
        Ok(Self { weights, effective_n: 1.0 / sum_sq })
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn effective_n(&self) -> f64 {
        self.effective_n
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// 两条已编码序列的一致度：双方均非 gap 的列中相同符号的比例。
/// gap-gap 不计为匹配；没有共同的非 gap 列时一致度为 0。
pub fn pairwise_identity(a: &[u8], b: &[u8]) -> f64 {
    let mut matches = 0usize;
    let mut aligned = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        if alphabet::is_gap(x) || alphabet::is_gap(y) {
            continue;
        }
        aligned += 1;
        if x == y {
            matches += 1;
        }
    }
    if aligned == 0 {
        0.0
    } else {
        matches as f64 / aligned as f64
    }
}
