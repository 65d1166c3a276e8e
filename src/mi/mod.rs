//! 互信息打分流水线
//!
//! 流程：参数校验 → 单序列短路 → 序列权重 → 选择伪计数 → 整体或分块计算 → top pairs。
//!
//! - 整体路径：一次计算 MI 与 APC；
//! - 分块路径：每个分块独立计算（各自重算权重与 APC），再按重叠区加权合并，
//!   合并后不再做 APC。单个分块的失败只影响该分块，记为全零子矩阵。

pub mod apc;
pub mod chunk;
pub mod freq;
pub mod result;
pub mod scorer;

use std::time::Instant;

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::config::{Chunking, ScoreParams};
use crate::error::{CovarError, Result};
use crate::msa::weights::SequenceWeights;
use crate::msa::Alignment;
use crate::util::alphabet::GAP;
use crate::util::matrix::SquareMatrix;

use chunk::{plan_chunks, recombine, ChunkWindow};
use freq::FrequencyModel;
pub use result::{
    top_pairs, ChunkInfo, CouplingResult, Method, PseudocountSource, ResultMeta, RunParams, TopPair,
};

/// 单个窗口（整条比对或一个分块）的打分结果
struct WindowScore {
    mi: SquareMatrix,
    coupling: SquareMatrix,
    active_columns: usize,
    degenerate: bool,
}

impl WindowScore {
    fn zeros(n: usize, degenerate: bool) -> Self {
        Self {
            mi: SquareMatrix::zeros(n),
            coupling: SquareMatrix::zeros(n),
            active_columns: 0,
            degenerate,
        }
    }
}

/// 对一个窗口计算 MI 与耦合矩阵。
///
/// 窗口内不同序列 ≤ 1 或不足 2 列时返回全零（degenerate）；
/// 通过 gap 过滤的列少于 2 时返回 `Insufficient`。
///
/// 伪计数为 0 时退化为原始计数 MI：忽略 `weights` 按等权重计数，且不做 gap 过滤。
fn score_window(
    aln: &Alignment,
    weights: &SequenceWeights,
    pseudocount: f64,
    params: &ScoreParams,
    apply_apc: bool,
) -> Result<WindowScore> {
    let n = aln.n_cols();
    if n < 2 || aln.distinct_rows() <= 1 {
        return Ok(WindowScore::zeros(n, true));
    }

    let raw_counts = pseudocount <= 0.0;
    let uniform;
    let weights = if raw_counts {
        uniform = SequenceWeights::uniform(aln.n_seqs());
        &uniform
    } else {
        weights
    };
    let model = FrequencyModel::new(aln, weights, pseudocount);
    let active: Vec<bool> = if raw_counts {
        vec![true; n]
    } else {
        (0..n).map(|i| model.gap_frequency(i) <= params.gap_threshold).collect()
    };
    let active_columns = active.iter().filter(|&&a| a).count();
    if active_columns < 2 {
        return Err(CovarError::Insufficient(format!(
            "{} of {} columns pass gap threshold {}",
            active_columns, n, params.gap_threshold
        )));
    }

    let mi = scorer::mi_matrix(&model, &active, params.parallel);
    let coupling = if apply_apc {
        let corrected = apc::apc_correct(&mi);
        if params.rna_adjust {
            apc::rna_adjust(&corrected)
        } else {
            corrected
        }
    } else {
        mi.clone()
    };
    Ok(WindowScore { mi, coupling, active_columns, degenerate: false })
}

/// 全零结果：不同序列 ≤ 1 时不做任何打分
fn short_circuit(
    aln: &Alignment,
    params: &ScoreParams,
    pseudocount: f64,
    source: PseudocountSource,
    started: Instant,
) -> CouplingResult {
    let n = aln.n_cols();
    let mut run = RunParams::new(params, aln.n_seqs(), n, aln.distinct_rows(), pseudocount, source);
    run.single_sequence = true;
    let first = aln.row(0);
    CouplingResult {
        mi_matrix: SquareMatrix::zeros(n),
        coupling_matrix: SquareMatrix::zeros(n),
        top_pairs: Vec::new(),
        method: Method::SingleSequence,
        params: run,
        effective_n: 1.0,
        conservation: vec![1.0; n],
        gap_frequency: first.iter().map(|&a| if a == GAP { 1.0 } else { 0.0 }).collect(),
        elapsed: started.elapsed(),
        meta: ResultMeta::default(),
    }
}

/// 对比对打分：加权、伪计数正则化的 MI，经 APC 校正；长比对自动分块。
///
/// `weights` 为 None 时按 `identity_threshold` 计算冗余降权；给定时长度必须等于序列数。
/// 只有输入与参数错误会返回 `Err`；分块或整体计算中数据不足时，
/// 对应区域为全零并在 `params.partial_failure` / `params.chunks` 中记录。
pub fn score_alignment<S: AsRef<[u8]>>(
    sequences: &[S],
    weights: Option<&[f64]>,
    params: &ScoreParams,
) -> Result<CouplingResult> {
    let started = Instant::now();
    params.validate()?;
    let aln = Alignment::from_sequences(sequences)?;
    let supplied = weights.map(|w| SequenceWeights::from_values(w, aln.n_seqs())).transpose()?;
    let (n_seqs, n_cols) = (aln.n_seqs(), aln.n_cols());

    let distinct = aln.distinct_rows();
    if distinct <= 1 {
        let (alpha, source) = match params.pseudocount {
            Some(a) => (a, PseudocountSource::Explicit),
            None => (params.pseudocount_policy.select(1.0), PseudocountSource::Adaptive),
        };
        info!(
            "{} sequences x {} columns with a single distinct sequence; returning zero matrices",
            n_seqs, n_cols
        );
        return Ok(short_circuit(&aln, params, alpha, source, started));
    }

    let whole_weights = match &supplied {
        Some(w) => w.clone(),
        None => SequenceWeights::from_identity(&aln, params.identity_threshold, params.parallel),
    };
    let effective_n = whole_weights.effective_n();
    // 伪计数只按整条比对的 Neff 选择一次，所有分块共用
    let (pseudocount, source) = match params.pseudocount {
        Some(a) => (a, PseudocountSource::Explicit),
        None => (params.pseudocount_policy.select(effective_n), PseudocountSource::Adaptive),
    };
    info!(
        "scoring {} sequences x {} columns: {} distinct, Neff {:.2}, pseudocount {}",
        n_seqs, n_cols, distinct, effective_n, pseudocount
    );

    let profile = FrequencyModel::new(&aln, &whole_weights, pseudocount);
    let conservation: Vec<f64> = (0..n_cols).map(|i| profile.conservation(i)).collect();
    let gap_frequency: Vec<f64> = (0..n_cols).map(|i| profile.gap_frequency(i)).collect();

    let mut run = RunParams::new(params, n_seqs, n_cols, distinct, pseudocount, source);

    let (mi_matrix, coupling_matrix, method) = if params.wants_chunking(n_cols) {
        let windows =
            plan_chunks(n_cols, params.chunk_size, params.overlap, params.min_chunk_fraction);
        info!(
            "splitting {} columns into {} chunks (size {}, overlap {})",
            n_cols,
            windows.len(),
            params.chunk_size,
            params.overlap
        );

        let score_one =
            |w: &ChunkWindow| score_chunk(&aln, w, supplied.as_ref(), pseudocount, params);
        let outcomes: Vec<(ChunkInfo, WindowScore)> = if params.parallel {
            windows.par_iter().map(score_one).collect()
        } else {
            windows.iter().map(score_one).collect()
        };

        let mut mis = Vec::with_capacity(outcomes.len());
        let mut couplings = Vec::with_capacity(outcomes.len());
        for (info, score) in outcomes {
            run.partial_failure |= info.failure.is_some();
            run.chunks.push(info);
            mis.push(score.mi);
            couplings.push(score.coupling);
        }

        let mut merged =
            recombine(n_cols, &windows, &[mis.as_slice(), couplings.as_slice()]).into_iter();
        let mi = merged.next().unwrap_or_else(|| SquareMatrix::zeros(n_cols));
        let coupling = merged.next().unwrap_or_else(|| SquareMatrix::zeros(n_cols));
        (mi, coupling, Method::Chunked)
    } else {
        let score = match score_window(&aln, &whole_weights, pseudocount, params, true) {
            Ok(s) => s,
            Err(e) => {
                warn!("whole-alignment scoring failed: {}; returning zero matrices", e);
                run.partial_failure = true;
                WindowScore::zeros(n_cols, false)
            }
        };
        debug!("{} of {} columns active", score.active_columns, n_cols);
        (score.mi, score.coupling, Method::Enhanced)
    };

    let top = top_pairs(&coupling_matrix, params.max_top_pairs);
    let elapsed = started.elapsed();
    info!("{} finished in {:.2?}, {} top pairs", method.tag(), elapsed, top.len());

    Ok(CouplingResult {
        mi_matrix,
        coupling_matrix,
        top_pairs: top,
        method,
        params: run,
        effective_n,
        conservation,
        gap_frequency,
        elapsed,
        meta: ResultMeta::default(),
    })
}

/// 单个分块：子比对上重算权重（调用方给定权重时沿用），失败时降级为全零
fn score_chunk(
    aln: &Alignment,
    window: &ChunkWindow,
    supplied: Option<&SequenceWeights>,
    pseudocount: f64,
    params: &ScoreParams,
) -> (ChunkInfo, WindowScore) {
    let sub = aln.slice_columns(window.start, window.end);
    let weights = match supplied {
        Some(w) => w.clone(),
        None => SequenceWeights::from_identity(&sub, params.identity_threshold, params.parallel),
    };
    let mut info = ChunkInfo {
        window: *window,
        effective_n: weights.effective_n(),
        active_columns: 0,
        degenerate: false,
        failure: None,
    };
    debug!(
        "chunk {} [{}, {}): Neff {:.2}",
        window.index, window.start, window.end, info.effective_n
    );

    match score_window(&sub, &weights, pseudocount, params, true) {
        Ok(score) => {
            info.active_columns = score.active_columns;
            info.degenerate = score.degenerate;
            (info, score)
        }
        Err(e) => {
            warn!(
                "chunk {} [{}, {}) failed: {}; using zeros",
                window.index, window.start, window.end, e
            );
            info.failure = Some(e.to_string());
            (info, WindowScore::zeros(window.len(), false))
        }
    }
}

/// 原始 MI：等权重、无伪计数、不做 gap 过滤与 APC，耦合矩阵即 MI 矩阵
pub fn score_plain<S: AsRef<[u8]>>(sequences: &[S]) -> Result<CouplingResult> {
    let started = Instant::now();
    let params = ScoreParams {
        pseudocount: Some(0.0),
        gap_threshold: 1.0,
        chunking: Chunking::Never,
        ..ScoreParams::default()
    };
    let aln = Alignment::from_sequences(sequences)?;
    let (n_seqs, n_cols) = (aln.n_seqs(), aln.n_cols());
    let distinct = aln.distinct_rows();
    if distinct <= 1 {
        return Ok(short_circuit(&aln, &params, 0.0, PseudocountSource::Explicit, started));
    }

    let weights = SequenceWeights::uniform(n_seqs);
    let model = FrequencyModel::new(&aln, &weights, 0.0);
    let conservation = (0..n_cols).map(|i| model.conservation(i)).collect();
    let gap_frequency = (0..n_cols).map(|i| model.gap_frequency(i)).collect();

    let mut run =
        RunParams::new(&params, n_seqs, n_cols, distinct, 0.0, PseudocountSource::Explicit);
    let score = match score_window(&aln, &weights, 0.0, &params, false) {
        Ok(s) => s,
        Err(e) => {
            warn!("plain scoring failed: {}; returning zero matrices", e);
            run.partial_failure = true;
            WindowScore::zeros(n_cols, false)
        }
    };

    Ok(CouplingResult {
        top_pairs: top_pairs(&score.coupling, params.max_top_pairs),
        mi_matrix: score.mi,
        coupling_matrix: score.coupling,
        method: Method::Plain,
        params: run,
        effective_n: weights.effective_n(),
        conservation,
        gap_frequency,
        elapsed: started.elapsed(),
        meta: ResultMeta::default(),
    })
}
