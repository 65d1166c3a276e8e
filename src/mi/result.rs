use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::chunk::ChunkWindow;
use crate::config::ScoreParams;
use crate::error::Result;
use crate::util::matrix::SquareMatrix;

/// 实际执行的计算路径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// 未加权、无伪计数、无 APC 的原始 MI
    Plain,
    /// 加权 + 伪计数 + APC，整条比对一次完成
    Enhanced,
    /// 分块计算后合并
    Chunked,
    /// 不同序列 ≤ 1，直接返回全零结果
    SingleSequence,
}

impl Method {
    pub fn tag(&self) -> &'static str {
        match self {
            Method::Plain => "mutual_information",
            Method::Enhanced => "mutual_information_enhanced",
            Method::Chunked => "mutual_information_chunked",
            Method::SingleSequence => "single_sequence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PseudocountSource {
    Explicit,
    Adaptive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopPair {
    pub i: usize,
    pub j: usize,
    pub score: f64,
}

/// 单个分块的处理记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkInfo {
    pub window: ChunkWindow,
    pub effective_n: f64,
    /// 通过 gap 过滤的列数
    pub active_columns: usize,
    /// 分块内不同序列 ≤ 1，结果为全零
    pub degenerate: bool,
    /// 失败原因；失败的分块以全零子矩阵参与合并
    pub failure: Option<String>,
}

/// 实际生效的参数回显
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub pseudocount: f64,
    pub pseudocount_source: PseudocountSource,
    pub alphabet_size: usize,
    pub gap_threshold: f64,
    pub identity_threshold: f64,
    pub max_length: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    pub rna_adjust: bool,
    pub n_seqs: usize,
    pub n_cols: usize,
    pub distinct_seqs: usize,
    pub single_sequence: bool,
    pub partial_failure: bool,
    pub chunks: Vec<ChunkInfo>,
}

impl RunParams {
    pub(crate) fn new(
        params: &ScoreParams,
        n_seqs: usize,
        n_cols: usize,
        distinct_seqs: usize,
        pseudocount: f64,
        pseudocount_source: PseudocountSource,
    ) -> Self {
        Self {
            pseudocount,
            pseudocount_source,
            alphabet_size: crate::util::alphabet::SIGMA,
            gap_threshold: params.gap_threshold,
            identity_threshold: params.identity_threshold,
            max_length: params.max_length,
            chunk_size: params.chunk_size,
            overlap: params.overlap,
            rna_adjust: params.rna_adjust,
            n_seqs,
            n_cols,
            distinct_seqs,
            single_sequence: distinct_seqs <= 1,
            partial_failure: false,
            chunks: Vec::new(),
        }
    }
}

/// 结果来源信息（由调用方填写）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMeta {
    pub msa_file: Option<String>,
    pub command: Option<String>,
    pub created_at: Option<String>,
}

/// 一次打分调用的完整结果；所有路径返回相同的字段与形状。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingResult {
    /// 原始 MI 矩阵（L×L，对称，对角线为 0）
    pub mi_matrix: SquareMatrix,
    /// APC 校正后的耦合矩阵，可能含负值
    pub coupling_matrix: SquareMatrix,
    pub top_pairs: Vec<TopPair>,
    pub method: Method,
    pub params: RunParams,
    pub effective_n: f64,
    /// 每列最常见符号的加权频率
    pub conservation: Vec<f64>,
    pub gap_frequency: Vec<f64>,
    pub elapsed: Duration,
    pub meta: ResultMeta,
}

impl CouplingResult {
    pub fn n_cols(&self) -> usize {
        self.coupling_matrix.dim()
    }

    pub fn is_single_sequence(&self) -> bool {
        self.params.single_sequence
    }

    pub fn set_meta(&mut self, meta: ResultMeta) {
        self.meta = meta;
    }

    pub fn save_to_file(&self, path: &str) -> Result<()> {
        let f = std::fs::File::create(path)?;
        bincode::serialize_into(std::io::BufWriter::new(f), self)?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path)?;
        let res: Self = bincode::deserialize_from(std::io::BufReader::new(f))?;
        Ok(res)
    }

    /// 以 TSV 输出 top pairs（0-based 列号）
    pub fn write_top_pairs<W: Write>(&self, mut out: W) -> Result<()> {
        writeln!(out, "i\tj\tscore")?;
        for p in &self.top_pairs {
            writeln!(out, "{}\t{}\t{:.6}", p.i, p.j, p.score)?;
        }
        Ok(())
    }
}

/// 取得分最高的位置对（i < j，只取正分），按得分降序，得分相同按 (i, j) 升序
pub fn top_pairs(m: &SquareMatrix, cap: usize) -> Vec<TopPair> {
    let mut pairs: Vec<TopPair> = m
        .upper_triangle()
        .filter(|&(_, _, score)| score > 0.0)
        .map(|(i, j, score)| TopPair { i, j, score })
        .collect();
    pairs.sort_by(|a, b| b.score.total_cmp(&a.score).then((a.i, a.j).cmp(&(b.i, b.j))));
    pairs.truncate(cap);
    pairs
}
