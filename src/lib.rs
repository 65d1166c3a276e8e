//! # rna-mi
//!
//! RNA 多序列比对的共变打分：加权、伪计数正则化的互信息（MI），
//! 经平均乘积校正（APC）后得到位置对的耦合强度，用于二级/三级结构接触预测。
//!
//! 本 crate 提供：
//!
//! - **编码与读入**：7 字母 RNA 字母表（A C G U T - N），FASTA 比对读取
//! - **序列权重**：按相似度对冗余序列降权，并给出有效序列数 Neff
//! - **频率与 MI**：带伪计数的单列/双列频率，按行并行计算的 MI 矩阵
//! - **APC 校正**：去除列熵带来的背景信号，可选的 RNA 近邻调整
//! - **长比对分块**：重叠分块独立计算后按边缘斜坡加权合并
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use rna_mi::{score_alignment, ScoreParams};
//!
//! let msa = ["GGGAAACCC", "GCGAAACGC", "GAGAAACUC", "GUGAAACAC"];
//! let res = score_alignment(&msa, None, &ScoreParams::default()).unwrap();
//! for p in &res.top_pairs {
//!     println!("{}\t{}\t{:.4}", p.i, p.j, p.score);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTA 比对读取
//! - [`msa`]：比对编码、序列权重、序列过滤
//! - [`mi`]：频率模型、MI、APC、分块与打分流水线
//! - [`config`]：打分参数与预设
//! - [`util`]：字母表编码与方阵

pub mod config;
pub mod error;
pub mod io;
pub mod mi;
pub mod msa;
pub mod util;

pub use config::{Chunking, LengthProfile, MsaQuality, PseudocountPolicy, ScoreParams};
pub use error::{CovarError, Result};
pub use mi::{score_alignment, score_plain, CouplingResult, Method, TopPair};
pub use util::matrix::SquareMatrix;
