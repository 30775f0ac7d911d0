//! 平面几何: 细胞边界的计算接口.
//!
//! 抽取流程只依赖 [`BoundaryBuilder`] trait, 具体的凸包算法可以替换.

mod qhull;

use crate::{Point2d, Vertices};
use thiserror::Error;

pub use qhull::Qhull;

/// 边界计算错误. 出错的细胞会被跳过, 不会终止转换.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    /// 互不相同的点不足三个.
    ///
    /// 参数代表去重后的点数.
    #[error("only {0} distinct points")]
    TooFewPoints(usize),

    /// 存在 NaN 或无穷坐标.
    #[error("non-finite coordinate")]
    NonFinite,

    /// 所有点共线, 无法围成多边形.
    #[error("points are collinear")]
    Degenerate,
}

/// 点集的凸多边形边界.
#[derive(Debug, Clone)]
pub struct Boundary {
    /// 凸包顶点在输入点集中的索引, 逆时针排列, 首尾不重复.
    hull: Vec<usize>,

    /// 外环顶点, 逆时针排列, 首顶点在末尾重复一次 (闭合环).
    exterior: Vertices,

    /// 多边形面积.
    area: f64,
}

impl Boundary {
    /// 从输入点集和凸包顶点索引构建.
    ///
    /// 调用者需保证 `hull` 至少含三个索引且按逆时针排列.
    pub(crate) fn from_hull(points: &[Point2d], hull: Vec<usize>) -> Self {
        debug_assert!(hull.len() >= 3);
        let mut exterior: Vertices = hull.iter().map(|&i| points[i]).collect();
        let area = shoelace_area(&exterior);
        exterior.push(exterior[0]);
        Self {
            hull,
            exterior,
            area,
        }
    }

    /// 凸包顶点索引 (逆时针, 不闭合).
    #[inline]
    pub fn hull_indices(&self) -> &[usize] {
        &self.hull
    }

    /// 闭合外环顶点.
    #[inline]
    pub fn exterior(&self) -> &[Point2d] {
        &self.exterior
    }

    /// 消费自我, 获得闭合外环顶点.
    #[inline]
    pub fn into_exterior(self) -> Vertices {
        self.exterior
    }

    /// 面积.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 凸包顶点个数 (不计闭合重复点).
    #[inline]
    pub fn hull_len(&self) -> usize {
        self.hull.len()
    }
}

/// 计算点集凸边界的能力.
pub trait BoundaryBuilder {
    /// 计算 `points` 的凸边界. 点集退化时返回 `Err`.
    fn convex_boundary(&self, points: &[Point2d]) -> Result<Boundary, BoundaryError>;
}

/// 鞋带公式计算简单多边形面积 (不要求闭合, 取绝对值).
pub fn shoelace_area(ring: &[Point2d]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let twice: f64 = ring
        .iter()
        .zip(ring.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 * y1 - x1 * y0)
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_shoelace_square() {
        let sq = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        assert!(f64_eq(shoelace_area(&sq), 4.0));

        // 闭合与否不影响结果.
        let closed = [(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0), (0.0, 0.0)];
        assert!(f64_eq(shoelace_area(&closed), 4.0));
    }

    #[test]
    fn test_shoelace_orientation_free() {
        let cw = [(0.0, 0.0), (0.0, 3.0), (4.0, 0.0)];
        let ccw = [(0.0, 0.0), (4.0, 0.0), (0.0, 3.0)];
        assert!(f64_eq(shoelace_area(&cw), 6.0));
        assert!(f64_eq(shoelace_area(&ccw), 6.0));
    }

    #[test]
    fn test_shoelace_too_short() {
        assert_eq!(shoelace_area(&[(1.0, 1.0), (2.0, 2.0)]), 0.0);
    }
}
