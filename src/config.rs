//! 打分参数与预设配置
//!
//! 所有参数都作为显式值传入 [`crate::score_alignment`]，核心代码不读取任何全局配置。

use serde::{Deserialize, Serialize};

use crate::error::{CovarError, Result};

/// 超过该列数时启用分块
pub const DEFAULT_MAX_LENGTH: usize = 750;
pub const DEFAULT_CHUNK_SIZE: usize = 600;
pub const DEFAULT_OVERLAP: usize = 200;
/// 末尾分块短于 chunk_size 的该比例时并入前一个分块
pub const DEFAULT_MIN_CHUNK_FRACTION: f64 = 0.75;
pub const DEFAULT_GAP_THRESHOLD: f64 = 0.5;
pub const DEFAULT_IDENTITY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MAX_SEQUENCES: usize = 5000;
pub const DEFAULT_MAX_TOP_PAIRS: usize = 100;

/// 按有效序列数选择伪计数的查找表
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PseudocountPolicy {
    /// Neff ≤ small_max 视为小比对
    pub small_max: f64,
    /// small_max < Neff ≤ medium_max 视为中等比对
    pub medium_max: f64,
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl Default for PseudocountPolicy {
    fn default() -> Self {
        Self { small_max: 25.0, medium_max: 100.0, small: 0.5, medium: 0.2, large: 0.0 }
    }
}

impl PseudocountPolicy {
    pub fn select(&self, effective_n: f64) -> f64 {
        if effective_n <= self.small_max {
            self.small
        } else if effective_n <= self.medium_max {
            self.medium
        } else {
            self.large
        }
    }
}

/// 分块策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chunking {
    /// 列数超过 `max_length` 时分块
    Auto,
    Never,
    /// 总是走分块路径（短比对只会产生一个分块）
    Always,
}

/// 一次打分调用的全部参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreParams {
    /// 显式伪计数；None 表示按 `pseudocount_policy` 自适应选择
    pub pseudocount: Option<f64>,
    pub pseudocount_policy: PseudocountPolicy,
    pub max_length: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_fraction: f64,
    pub chunking: Chunking,
    /// gap 频率高于此值的列不参与打分
    pub gap_threshold: f64,
    pub identity_threshold: f64,
    pub max_top_pairs: usize,
    /// 额外的 RNA 调整（近邻降权 + 高斯平滑）
    pub rna_adjust: bool,
    pub parallel: bool,
}

impl Default for ScoreParams {
    fn default() -> Self {
        Self {
            pseudocount: None,
            pseudocount_policy: PseudocountPolicy::default(),
            max_length: DEFAULT_MAX_LENGTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            min_chunk_fraction: DEFAULT_MIN_CHUNK_FRACTION,
            chunking: Chunking::Auto,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
            max_top_pairs: DEFAULT_MAX_TOP_PAIRS,
            rna_adjust: false,
            parallel: true,
        }
    }
}

impl ScoreParams {
    pub fn validate(&self) -> Result<()> {
        if let Some(alpha) = self.pseudocount {
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(CovarError::InvalidParams(format!(
                    "pseudocount must be a non-negative number, got {}",
                    alpha
                )));
            }
        }
        if self.chunk_size == 0 {
            return Err(CovarError::InvalidParams("chunk_size must be positive".into()));
        }
        if self.overlap >= self.chunk_size {
            return Err(CovarError::InvalidParams(format!(
                "overlap {} must be smaller than chunk_size {}",
                self.overlap, self.chunk_size
            )));
        }
        for (name, v) in [
            ("gap_threshold", self.gap_threshold),
            ("identity_threshold", self.identity_threshold),
            ("min_chunk_fraction", self.min_chunk_fraction),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CovarError::InvalidParams(format!(
                    "{} must be in [0, 1], got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }

    /// 是否对 n_cols 列的比对分块
    pub fn wants_chunking(&self, n_cols: usize) -> bool {
        match self.chunking {
            Chunking::Auto => n_cols > self.max_length,
            Chunking::Never => false,
            Chunking::Always => true,
        }
    }

    pub fn with_length_profile(mut self, profile: LengthProfile) -> Self {
        profile.apply(&mut self);
        self
    }

    pub fn with_quality(mut self, quality: MsaQuality) -> Self {
        quality.apply(&mut self);
        self
    }

    /// 按可用内存收缩长序列的分块大小。
    ///
    /// 仅在 n_cols > 1000 时生效：chunk_size 按 available_mb / 32768 缩放（不低于 400），
    /// overlap 取 chunk_size 的三分之一（不低于 150，且小于 chunk_size）。
    pub fn fit_memory_budget(&mut self, available_mb: f64, n_cols: usize) {
        if n_cols <= 1000 {
            return;
        }
        let factor = (available_mb / 32768.0).clamp(0.0, 1.0);
        self.chunk_size = ((self.chunk_size as f64 * factor) as usize).max(400);
        self.overlap = ((self.chunk_size as f64 * 0.33) as usize).max(150);
    }
}

/// 按 RNA 长度区间的预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum LengthProfile {
    /// < 300 nt，不分块
    Short,
    /// 300–750 nt
    Medium,
    /// 750–1500 nt
    Long,
    /// > 1500 nt，更大的重叠保证一致性
    VeryLong,
}

impl LengthProfile {
    pub fn for_length(n_cols: usize) -> Self {
        match n_cols {
            0..=299 => LengthProfile::Short,
            300..=750 => LengthProfile::Medium,
            751..=1500 => LengthProfile::Long,
            _ => LengthProfile::VeryLong,
        }
    }

    pub fn apply(&self, params: &mut ScoreParams) {
        match self {
            LengthProfile::Short => {
                params.max_length = 300;
                params.chunking = Chunking::Never;
            }
            LengthProfile::Medium => set_geometry(params, 750, 600, 150),
            LengthProfile::Long => set_geometry(params, 750, 600, 200),
            LengthProfile::VeryLong => set_geometry(params, 750, 500, 250),
        }
    }
}

fn set_geometry(params: &mut ScoreParams, max_length: usize, chunk_size: usize, overlap: usize) {
    params.max_length = max_length;
    params.chunk_size = chunk_size;
    params.overlap = overlap;
    params.chunking = Chunking::Auto;
}

/// 按 MSA 质量的预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum MsaQuality {
    /// 序列多且多样
    High,
    Medium,
    /// 序列少或高度相似
    Low,
}

impl MsaQuality {
    pub fn apply(&self, params: &mut ScoreParams) {
        let (gap, identity, alpha) = match self {
            MsaQuality::High => (0.4, 0.85, 0.2),
            MsaQuality::Medium => (0.5, 0.8, 0.5),
            MsaQuality::Low => (0.6, 0.7, 0.8),
        };
        params.gap_threshold = gap;
        params.identity_threshold = identity;
        params.pseudocount = Some(alpha);
    }

    pub fn max_sequences(&self) -> usize {
        match self {
            MsaQuality::High => 10_000,
            MsaQuality::Medium => DEFAULT_MAX_SEQUENCES,
            MsaQuality::Low => 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudocount_buckets() {
        let p = PseudocountPolicy::default();
        assert_eq!(p.select(1.0), 0.5);
        assert_eq!(p.select(25.0), 0.5);
        assert_eq!(p.select(26.0), 0.2);
        assert_eq!(p.select(100.0), 0.2);
        assert_eq!(p.select(100.5), 0.0);
    }

    #[test]
    fn default_params_are_valid() {
        let p = ScoreParams::default();
        assert!(p.validate().is_ok());
        assert!(!p.wants_chunking(750));
        assert!(p.wants_chunking(751));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let bad = [
            ScoreParams { pseudocount: Some(-0.1), ..ScoreParams::default() },
            ScoreParams { pseudocount: Some(f64::NAN), ..ScoreParams::default() },
            ScoreParams { chunk_size: 0, ..ScoreParams::default() },
            ScoreParams { chunk_size: 100, overlap: 100, ..ScoreParams::default() },
            ScoreParams { gap_threshold: 1.5, ..ScoreParams::default() },
            ScoreParams { identity_threshold: -0.2, ..ScoreParams::default() },
        ];
        for p in bad {
            assert!(matches!(p.validate(), Err(CovarError::InvalidParams(_))), "{:?}", p);
        }
    }

    #[test]
    fn length_profiles() {
        assert_eq!(LengthProfile::for_length(120), LengthProfile::Short);
        assert_eq!(LengthProfile::for_length(750), LengthProfile::Medium);
        assert_eq!(LengthProfile::for_length(1200), LengthProfile::Long);
        assert_eq!(LengthProfile::for_length(4000), LengthProfile::VeryLong);

        let p = ScoreParams::default().with_length_profile(LengthProfile::VeryLong);
        assert_eq!((p.chunk_size, p.overlap), (500, 250));
        let p = ScoreParams::default().with_length_profile(LengthProfile::Short);
        assert!(!p.wants_chunking(5000));
    }

    #[test]
    fn quality_sets_pseudocount() {
        let p = ScoreParams::default().with_quality(MsaQuality::Low);
        assert_eq!(p.pseudocount, Some(0.8));
        assert_eq!(p.identity_threshold, 0.7);
        assert_eq!(MsaQuality::High.max_sequences(), 10_000);
    }

    #[test]
    fn memory_budget_shrinks_long_inputs_only() {
        let mut p = ScoreParams::default();
        p.fit_memory_budget(4096.0, 800);
        assert_eq!(p.chunk_size, DEFAULT_CHUNK_SIZE);

        p.fit_memory_budget(4096.0, 3000);
        assert_eq!(p.chunk_size, 400);
        assert_eq!(p.overlap, 150);
        assert!(p.validate().is_ok());
    }
}
