//! qhull 凸包.

use super::{Boundary, BoundaryBuilder, BoundaryError};
use crate::Point2d;
use ordered_float::OrderedFloat;
use qhull_enhanced::Qh;

/// 基于 qhull 的二维凸包.
///
/// 共线的边上点不会成为凸包顶点. 顶点按逆时针排列, 从最左 (其次最下) 的顶点开始.
#[derive(Debug, Copy, Clone, Default)]
pub struct Qhull;

#[inline]
fn key(p: Point2d) -> (OrderedFloat<f64>, OrderedFloat<f64>) {
    (OrderedFloat(p.0), OrderedFloat(p.1))
}

/// 将凸包顶点按绕质心的极角排序, 再旋转到最左下的顶点开头.
fn counter_clockwise(points: &[Point2d], mut hull: Vec<usize>) -> Vec<usize> {
    let n = hull.len() as f64;
    let cx = hull.iter().map(|&i| points[i].0).sum::<f64>() / n;
    let cy = hull.iter().map(|&i| points[i].1).sum::<f64>() / n;
    hull.sort_by_key(|&i| OrderedFloat((points[i].1 - cy).atan2(points[i].0 - cx)));

    let start = hull
        .iter()
        .enumerate()
        .min_by_key(|(_, &i)| key(points[i]))
        .map_or(0, |(k, _)| k);
    hull.rotate_left(start);
    hull
}

impl BoundaryBuilder for Qhull {
    fn convex_boundary(&self, points: &[Point2d]) -> Result<Boundary, BoundaryError> {
        if points.iter().any(|p| !p.0.is_finite() || !p.1.is_finite()) {
            return Err(BoundaryError::NonFinite);
        }

        let mut distinct: Vec<_> = points.iter().map(|&p| key(p)).collect();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() < 3 {
            return Err(BoundaryError::TooFewPoints(distinct.len()));
        }

        // 所有点共线时 qhull 无法构造初始单纯形.
        let qh = Qh::builder()
            .compute(true)
            .build_from_iter(points.iter().map(|&(x, y)| [x, y]))
            .map_err(|_| BoundaryError::Degenerate)?;

        let mut hull = Vec::new();
        for simplex in qh.simplices() {
            let vertices = simplex.vertices().ok_or(BoundaryError::Degenerate)?;
            for v in vertices.iter() {
                hull.push(v.index(&qh).ok_or(BoundaryError::Degenerate)?);
            }
        }
        hull.sort_unstable();
        hull.dedup();

        if hull.len() < 3 {
            return Err(BoundaryError::Degenerate);
        }
        Ok(Boundary::from_hull(points, counter_clockwise(points, hull)))
    }
}
