//! 定长顶点数组.
//!
//! 将每个细胞长度不一的顶点序列规范化为 `(N, M, 2)` 的 `f32` 数组:
//! 超出 `M` 的部分直接截断 (不重采样), 不足 `M` 的部分以 `(0.0, 0.0)` 补齐.

use crate::{Point2d, Vertices};
use log::warn;
use ndarray::{Array3, ArrayViewMut2};

/// 将 `polygons` 打包为 `(polygons.len(), max_vertices, 2)` 的数组, 保持输入顺序.
///
/// 空序列得到全零行.
pub fn pack_vertices(polygons: &[Vertices], max_vertices: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((polygons.len(), max_vertices, 2));
    for (row, poly) in out.outer_iter_mut().zip(polygons) {
        fill_row(row, poly);
    }
    out
}

/// 将扁平坐标 `[x0, y0, x1, y1, ...]` 打包为定长数组.
///
/// 坐标个数为奇数的序列无法还原为二维顶点, 该行退化为全零并记录警告,
/// 不影响其他行.
///
/// 转换流程本身不调用这个函数, 它面向手里只有扁平坐标缓冲区
/// (例如从其他 zarr 或 parquet 读出的多边形列) 的库调用方.
pub fn pack_flat_vertices(polygons: &[Vec<f64>], max_vertices: usize) -> Array3<f32> {
    let mut out = Array3::<f32>::zeros((polygons.len(), max_vertices, 2));
    for (index, (row, flat)) in out.outer_iter_mut().zip(polygons).enumerate() {
        match reshape_flat(flat) {
            Some(poly) => fill_row(row, &poly),
            None => warn!(
                "polygon #{index}: cannot reshape {} coordinates into (x, y) pairs, zero-filled",
                flat.len()
            ),
        }
    }
    out
}

/// `[x0, y0, x1, y1, ...]` -> `[(x0, y0), (x1, y1), ...]`. 长度为奇数时返回 `None`.
fn reshape_flat(flat: &[f64]) -> Option<Vertices> {
    if flat.len() % 2 != 0 {
        return None;
    }
    Some(flat.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

/// 写入一行. `row` 已经全零, 只需写入前 `min(M, len)` 个顶点.
#[inline]
fn fill_row(mut row: ArrayViewMut2<f32>, poly: &[Point2d]) {
    let max_vertices = row.nrows();
    for (j, &(x, y)) in poly.iter().take(max_vertices).enumerate() {
        row[[j, 0]] = x as f32;
        row[[j, 1]] = y as f32;
    }
}
