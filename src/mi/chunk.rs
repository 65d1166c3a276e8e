use serde::{Deserialize, Serialize};

use crate::util::matrix::SquareMatrix;

/// 分块窗口：列区间 [start, end)，start 即其在全长坐标中的偏移
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkWindow {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl ChunkWindow {
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    #[inline]
    pub fn contains(&self, col: usize) -> bool {
        col >= self.start && col < self.end
    }
}

/// 规划分块：步长 chunk_size - overlap，最后一块截断到 n_cols；
/// 末尾分块短于 min_fraction · chunk_size 时并入前一块。
pub fn plan_chunks(
    n_cols: usize,
    chunk_size: usize,
    overlap: usize,
    min_fraction: f64,
) -> Vec<ChunkWindow> {
    assert!(chunk_size > overlap, "overlap must be smaller than chunk size");
    let stride = chunk_size - overlap;
    let min_len = (chunk_size as f64 * min_fraction).ceil() as usize;

    let mut windows: Vec<ChunkWindow> = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(n_cols);
        if end - start < min_len && !windows.is_empty() {
            if let Some(last) = windows.last_mut() {
                last.end = end;
            }
        } else {
            windows.push(ChunkWindow { index: windows.len(), start, end });
        }
        if end == n_cols {
            break;
        }
        start += stride;
    }
    windows
}

/// 列 x 在窗口中的融合权重：与相邻窗口共享的一侧按线性斜坡从边界升到 1，
/// 不共享的一侧恒为 1。权重始终为正。
fn taper(windows: &[ChunkWindow], w: &ChunkWindow, x: usize) -> f64 {
    let left = match w.index.checked_sub(1).map(|p| &windows[p]) {
        Some(prev) if prev.end > w.start => {
            ((x - w.start) as f64 + 0.5) / (prev.end - w.start) as f64
        }
        _ => 1.0,
    };
    let right = match windows.get(w.index + 1) {
        Some(next) if w.end > next.start => {
            ((w.end - x) as f64 - 0.5) / (w.end - next.start) as f64
        }
        _ => 1.0,
    };
    left.min(right).min(1.0)
}

/// 将各分块的子矩阵合并为全长矩阵。
///
/// 只被一个分块覆盖的位置对直接取该分块的值；被多个分块覆盖的取加权平均，
/// 权重为两列各自边缘斜坡权重之积；未被任何分块覆盖的位置对为 0。
/// 结果与分块的处理顺序无关。每个输入按相同的权重合并，共用一次权重计算。
pub fn recombine(
    n_cols: usize,
    windows: &[ChunkWindow],
    parts: &[&[SquareMatrix]],
) -> Vec<SquareMatrix> {
    // 覆盖每一列的分块下标是连续区间 [first, last]
    let mut first = vec![usize::MAX; n_cols];
    let mut last = vec![0usize; n_cols];
    for w in windows {
        for x in w.start..w.end {
            first[x] = first[x].min(w.index);
            last[x] = last[x].max(w.index);
        }
    }
    let coverage = |i: usize, j: usize| -> usize {
        if first[i] == usize::MAX || first[j] == usize::MAX {
            return 0;
        }
        let lo = first[i].max(first[j]);
        let hi = last[i].min(last[j]);
        if hi >= lo {
            hi - lo + 1
        } else {
            0
        }
    };

    let mut sums: Vec<Vec<f64>> = parts.iter().map(|_| vec![0.0; n_cols * n_cols]).collect();
    let mut weight = vec![0.0; n_cols * n_cols];

    for w in windows {
        let tapers: Vec<f64> = (w.start..w.end).map(|x| taper(windows, w, x)).collect();
        for a in 0..w.len() {
            let gi = w.start + a;
            for b in 0..w.len() {
                let gj = w.start + b;
                let idx = gi * n_cols + gj;
                if coverage(gi, gj) == 1 {
                    for (sum, part) in sums.iter_mut().zip(parts) {
                        sum[idx] = part[w.index].get(a, b);
                    }
                    continue;
                }
                let wt = tapers[a] * tapers[b];
                weight[idx] += wt;
                for (sum, part) in sums.iter_mut().zip(parts) {
                    sum[idx] += wt * part[w.index].get(a, b);
                }
            }
        }
    }

    sums.into_iter()
        .map(|mut sum| {
            for (v, &wt) in sum.iter_mut().zip(&weight) {
                if wt > 0.0 {
                    *v /= wt;
                }
            }
            SquareMatrix::from_vec(n_cols, sum)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(ws: &[ChunkWindow]) -> Vec<(usize, usize)> {
        ws.iter().map(|w| (w.start, w.end)).collect()
    }

    #[test]
    fn plan_tiles_with_stride() {
        let ws = plan_chunks(1600, 600, 150, 0.75);
        // [1350,1600) 只有 250 列，并入前一块
        assert_eq!(spans(&ws), vec![(0, 600), (450, 1050), (900, 1600)]);
        assert_eq!(ws.iter().map(|w| w.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn plan_merges_short_tail() {
        let ws = plan_chunks(1000, 600, 200, 0.75);
        assert_eq!(spans(&ws), vec![(0, 600), (400, 1000)]);
        let ws = plan_chunks(1500, 600, 200, 0.75);
        assert_eq!(spans(&ws), vec![(0, 600), (400, 1000), (800, 1500)]);
    }

    #[test]
    fn short_input_is_a_single_window() {
        let ws = plan_chunks(300, 600, 200, 0.75);
        assert_eq!(spans(&ws), vec![(0, 300)]);
    }

    #[test]
    fn windows_cover_every_column() {
        for (n, c, o) in [(751, 600, 200), (2000, 500, 250), (4000, 600, 150), (601, 600, 599)] {
            let ws = plan_chunks(n, c, o, 0.75);
            assert_eq!(ws[0].start, 0);
            assert_eq!(ws.last().unwrap().end, n);
            for pair in ws.windows(2) {
                assert!(pair[1].start < pair[0].end, "gap between windows for n={}", n);
            }
        }
    }

    #[test]
    fn single_window_is_identity() {
        let ws = plan_chunks(5, 600, 200, 0.75);
        let mut m = SquareMatrix::zeros(5);
        m.set_sym(0, 3, 0.7);
        m.set_sym(1, 2, -0.2);
        let out = recombine(5, &ws, &[std::slice::from_ref(&m)]);
        assert_eq!(out[0], m);
    }

    #[test]
    fn overlapping_constant_blocks_stay_constant() {
        let ws = plan_chunks(10, 6, 3, 0.5);
        assert_eq!(spans(&ws), vec![(0, 6), (3, 9), (6, 10)]);
        let parts: Vec<SquareMatrix> = ws
            .iter()
            .map(|w| SquareMatrix::from_vec(w.len(), vec![1.0; w.len() * w.len()]))
            .collect();
        let out = recombine(10, &ws, &[parts.as_slice()]);
        for w in &ws {
            for i in w.start..w.end {
                for j in w.start..w.end {
                    assert!((out[0].get(i, j) - 1.0).abs() < 1e-12);
                }
            }
        }
        // 不在任何共同窗口中的位置对为 0
        assert_eq!(out[0].get(0, 9), 0.0);
    }

    #[test]
    fn blend_is_symmetric_and_between_contributors() {
        let ws = plan_chunks(10, 6, 3, 0.5);
        let parts: Vec<SquareMatrix> = ws
            .iter()
            .map(|w| SquareMatrix::from_vec(w.len(), vec![w.index as f64; w.len() * w.len()]))
            .collect();
        let out = recombine(10, &ws, &[parts.as_slice()]);
        assert!(out[0].is_symmetric());
        // 第 0、1 块的重叠区 [3, 6)：值在 0 与 1 之间，越靠右越接近 1
        let a = out[0].get(3, 3);
        let b = out[0].get(5, 5);
        assert!(a > 0.0 && a < 1.0);
        assert!(b > a);
    }
}
