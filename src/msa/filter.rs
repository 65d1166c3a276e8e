use log::{info, warn};

use super::weights::SequenceWeights;
use super::Alignment;
use crate::config::{DEFAULT_GAP_THRESHOLD, DEFAULT_IDENTITY_THRESHOLD, DEFAULT_MAX_SEQUENCES};

/// 比对预过滤参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// 单条序列允许的最大 gap 比例
    pub gap_threshold: f64,
    /// 冗余降权使用的一致度阈值
    pub identity_threshold: f64,
    /// 最多保留的序列数
    pub max_sequences: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
            max_sequences: DEFAULT_MAX_SEQUENCES,
        }
    }
}

/// 过滤结果：保留的序列（按权重降序）及其原始下标
#[derive(Debug, Clone)]
pub struct FilteredAlignment {
    pub alignment: Alignment,
    pub kept: Vec<usize>,
}

/// 过滤比对以降低冗余：
/// 1. 去除 gap 比例超过阈值的序列；
/// 2. 按冗余权重降序保留至多 `max_sequences` 条（权重相同保持原顺序）。
///
/// 列不会被删除，坐标保持与输入一致。所有序列都被去除时返回 None。
pub fn filter_sequences(aln: &Alignment, params: &FilterParams) -> Option<FilteredAlignment> {
    let gapped_ok: Vec<usize> = (0..aln.n_seqs())
        .filter(|&k| aln.row_gap_fraction(k) <= params.gap_threshold)
        .collect();
    if gapped_ok.is_empty() {
        warn!("all {} sequences exceed gap fraction {}", aln.n_seqs(), params.gap_threshold);
        return None;
    }
    if gapped_ok.len() < aln.n_seqs() {
        info!(
            "gap filter kept {}/{} sequences",
            gapped_ok.len(),
            aln.n_seqs()
        );
    }

    let candidates = aln.select_rows(&gapped_ok);
    let weights = SequenceWeights::from_identity(&candidates, params.identity_threshold, true);

    let mut order: Vec<usize> = (0..candidates.n_seqs()).collect();
    order.sort_by(|&a, &b| weights.as_slice()[b].total_cmp(&weights.as_slice()[a]));
    order.truncate(params.max_sequences.max(1));

    let kept: Vec<usize> = order.iter().map(|&k| gapped_ok[k]).collect();
    info!(
        "diversity filter kept {} sequences (Neff {:.1})",
        kept.len(),
        weights.effective_n()
    );
    Some(FilteredAlignment { alignment: aln.select_rows(&kept), kept })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_gappy_sequences() {
        let aln = Alignment::from_sequences(&["ACGUAC", "A-----", "UCGUAA"]).unwrap();
        let out = filter_sequences(&aln, &FilterParams::default()).unwrap();
        assert_eq!(out.alignment.n_seqs(), 2);
        assert!(!out.kept.contains(&1));
        assert_eq!(out.alignment.n_cols(), 6);
    }

    #[test]
    fn keeps_most_unique_first() {
        // 三条相同序列 + 一条独特序列，只保留两条时独特序列必在其中
        let aln = Alignment::from_sequences(&["ACGUAC", "ACGUAC", "GUCAGU", "ACGUAC"]).unwrap();
        let params = FilterParams { max_sequences: 2, ..FilterParams::default() };
        let out = filter_sequences(&aln, &params).unwrap();
        assert_eq!(out.kept, vec![2, 0]);
    }

    #[test]
    fn everything_filtered_gives_none() {
        let aln = Alignment::from_sequences(&["----", "---A"]).unwrap();
        assert!(filter_sequences(&aln, &FilterParams::default()).is_none());
    }
}
