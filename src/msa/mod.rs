//! 多序列比对（MSA）的内存表示与序列权重、过滤

pub mod filter;
pub mod weights;

use std::collections::HashSet;

use crate::error::{CovarError, Result};
use crate::util::alphabet;

/// 已编码的比对：N 条等长序列，每条长度 L（列数）。
///
/// 数据按行优先展平：data[k * n_cols + i] 为第 k 条序列第 i 列的编码。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    n_seqs: usize,
    n_cols: usize,
    data: Vec<u8>,
}

impl Alignment {
    /// 从原始字符序列构建比对。空列表、零长度或长度不一致均视为非法输入。
    pub fn from_sequences<S: AsRef<[u8]>>(sequences: &[S]) -> Result<Self> {
        let first = sequences
            .first()
            .ok_or_else(|| CovarError::InvalidInput("alignment contains no sequences".into()))?;
        let n_cols = first.as_ref().len();
        if n_cols == 0 {
            return Err(CovarError::InvalidInput("alignment sequences are empty".into()));
        }

        let mut data = Vec::with_capacity(n_cols * sequences.len());
        for (k, seq) in sequences.iter().enumerate() {
            let seq = seq.as_ref();
            if seq.len() != n_cols {
                return Err(CovarError::InvalidInput(format!(
                    "sequence {} has length {}, expected {}",
                    k,
                    seq.len(),
                    n_cols
                )));
            }
            data.extend(seq.iter().map(|&b| alphabet::to_alphabet(b)));
        }

        Ok(Self { n_seqs: sequences.len(), n_cols, data })
    }

    #[inline]
    pub fn n_seqs(&self) -> usize {
        self.n_seqs
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn row(&self, k: usize) -> &[u8] {
        &self.data[k * self.n_cols..(k + 1) * self.n_cols]
    }

    #[inline]
    pub fn symbol(&self, k: usize, i: usize) -> u8 {
        self.data[k * self.n_cols + i]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.data.chunks_exact(self.n_cols)
    }

    /// 不同序列（编码后）的个数
    pub fn distinct_rows(&self) -> usize {
        self.rows().collect::<HashSet<&[u8]>>().len()
    }

    /// 截取列区间 [start, end) 组成子比对
    pub fn slice_columns(&self, start: usize, end: usize) -> Alignment {
        assert!(start < end && end <= self.n_cols, "column range out of bounds");
        let width = end - start;
        let mut data = Vec::with_capacity(width * self.n_seqs);
        for row in self.rows() {
            data.extend_from_slice(&row[start..end]);
        }
        Alignment { n_seqs: self.n_seqs, n_cols: width, data }
    }

    /// 按给定顺序选取若干序列
    pub fn select_rows(&self, indices: &[usize]) -> Alignment {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &k in indices {
            data.extend_from_slice(self.row(k));
        }
        Alignment { n_seqs: indices.len(), n_cols: self.n_cols, data }
    }

    /// 第 k 条序列中 gap 的比例
    pub fn row_gap_fraction(&self, k: usize) -> f64 {
        let gaps = self.row(k).iter().filter(|&&a| alphabet::is_gap(a)).count();
        gaps as f64 / self.n_cols as f64
    }

    /// 解码回字符序列（T 已折叠为 U）
    pub fn to_strings(&self) -> Vec<String> {
        self.rows()
            .map(|row| String::from_utf8_lossy(&alphabet::decode_seq(row)).into_owned())
            .collect()
    }
}
