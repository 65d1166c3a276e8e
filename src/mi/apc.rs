use crate::util::matrix::SquareMatrix;

/// 总体均值低于该值时视为 0，跳过校正
pub const MEAN_EPSILON: f64 = 1e-12;

/// 平均乘积校正（APC）
///
/// APC(i,j) = MI(i,j) - mean_i · mean_j / mean_all，
/// mean_i 为第 i 行除对角线外的均值，mean_all 为所有非对角元素的均值。
/// 结果可以为负；对角线保持为 0。
pub fn apc_correct(mi: &SquareMatrix) -> SquareMatrix {
    let n = mi.dim();
    if n < 2 {
        return mi.clone();
    }

    let others = (n - 1) as f64;
    let row_means: Vec<f64> = (0..n)
        .map(|i| {
            let sum: f64 =
                mi.row(i).iter().enumerate().filter(|&(j, _)| j != i).map(|(_, v)| v).sum();
            sum / others
        })
        .collect();
    // 每行恰有 n-1 个非对角元素，总体均值即行均值的均值
    let overall = row_means.iter().sum::<f64>() / n as f64;

    if overall.abs() < MEAN_EPSILON {
        return mi.clone();
    }

    let mut out = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let background = row_means[i] * row_means[j] / overall;
            out.set_sym(i, j, mi.get(i, j) - background);
        }
    }
    out
}

/// 近邻降权的序列距离范围（含两端）
const NEAR_MIN: usize = 2;
const NEAR_MAX: usize = 8;
const SMOOTH_SIGMA: f64 = 0.6;
const SMOOTH_TRUNCATE: f64 = 4.0;

/// RNA 额外调整：
/// 1. 序列距离 2..=8 的位置对按 0.7 + 0.3·ln(d)/ln(8) 降权（直接相邻的不降权）；
/// 2. σ = 0.6 的高斯平滑（边界按反射处理）。
///
/// 输出重新对称化，对角线置 0。
pub fn rna_adjust(m: &SquareMatrix) -> SquareMatrix {
    let n = m.dim();
    let mut weighted = m.clone();
    for i in 0..n {
        for d in NEAR_MIN..=NEAR_MAX {
            let j = i + d;
            if j >= n {
                break;
            }
            let w = 0.7 + 0.3 * (d as f64).ln() / (NEAR_MAX as f64).ln();
            weighted.set_sym(i, j, m.get(i, j) * w);
        }
    }

    let kernel = gaussian_kernel(SMOOTH_SIGMA, SMOOTH_TRUNCATE);
    let smoothed = convolve_cols(&convolve_rows(&weighted, &kernel), &kernel);

    let mut out = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in (i + 1)..n {
            out.set_sym(i, j, 0.5 * (smoothed.get(i, j) + smoothed.get(j, i)));
        }
    }
    out
}

fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f64> {
    let radius = (truncate * sigma + 0.5) as isize;
    let mut k: Vec<f64> = (-radius..=radius)
        .map(|x| (-(x * x) as f64 / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = k.iter().sum();
    k.iter_mut().for_each(|v| *v /= total);
    k
}

/// 半样本对称反射：d c b a | a b c d | d c b a
#[inline]
fn reflect(idx: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let mut r = idx.rem_euclid(period);
    if r >= n {
        r = period - 1 - r;
    }
    r as usize
}

fn convolve_rows(m: &SquareMatrix, kernel: &[f64]) -> SquareMatrix {
    let n = m.dim();
    let radius = (kernel.len() / 2) as isize;
    let mut out = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in 0..n {
            let v: f64 = kernel
                .iter()
                .enumerate()
                .map(|(t, &k)| k * m.get(i, reflect(j as isize + t as isize - radius, n)))
                .sum();
            out.set(i, j, v);
        }
    }
    out
}

fn convolve_cols(m: &SquareMatrix, kernel: &[f64]) -> SquareMatrix {
    let n = m.dim();
    let radius = (kernel.len() / 2) as isize;
    let mut out = SquareMatrix::zeros(n);
    for i in 0..n {
        for j in 0..n {
            let v: f64 = kernel
                .iter()
                .enumerate()
                .map(|(t, &k)| k * m.get(reflect(i as isize + t as isize - radius, n), j))
                .sum();
            out.set(i, j, v);
        }
    }
    out
}
