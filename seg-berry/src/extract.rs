//! 细胞边界抽取.
//!
//! 按细胞分配列对转录本分组 (保持首次出现的顺序), 对每个细胞计算凸包边界,
//! 并按转录本个数与面积区间过滤. 通过过滤的细胞依次获得从 1 开始的稠密数值 id.

use crate::consts::{columns, MIN_CELL_TRANSCRIPTS, MIN_NUCLEUS_TRANSCRIPTS, Z_LEVEL_STEP};
use crate::geometry::{BoundaryBuilder, BoundaryError, Qhull};
use crate::table::TranscriptTable;
use crate::{Point2d, Vertices};
use log::{debug, info};
use std::collections::HashMap;

/// 闭区间形式的面积范围.
///
/// 该范围是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AreaRange {
    low: f64,
    high: f64,
}

impl AreaRange {
    /// 构建面积范围.
    ///
    /// `low` 和 `high` 必须是有限值且 `low <= high`, 否则返回 `None`.
    pub fn new(low: f64, high: f64) -> Option<AreaRange> {
        if low.is_finite() && high.is_finite() && low <= high {
            Some(Self { low, high })
        } else {
            None
        }
    }

    /// 下限.
    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// 上限.
    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// `area` 是否落在 `[low, high]` 内.
    #[inline]
    pub fn contains(&self, area: f64) -> bool {
        (self.low..=self.high).contains(&area)
    }
}

/// 默认范围 `[10, 100]`.
impl Default for AreaRange {
    #[inline]
    fn default() -> Self {
        Self {
            low: 10.0,
            high: 100.0,
        }
    }
}

/// 通过过滤的细胞.
#[derive(Debug, Clone)]
pub struct Cell {
    id: u32,
    original: String,
    centroid: Point2d,
    area: f64,
    z_level: f64,
    boundary: Vertices,
    nucleus: Vertices,
}

impl Cell {
    /// 稠密数值 id, 从 1 开始.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 原始文本标识符.
    #[inline]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// 全部转录本坐标的平均值.
    #[inline]
    pub fn centroid(&self) -> Point2d {
        self.centroid
    }

    /// 凸包面积.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// 以 3 为步长分桶的 z 层级.
    #[inline]
    pub fn z_level(&self) -> f64 {
        self.z_level
    }

    /// 细胞边界闭合外环.
    #[inline]
    pub fn boundary(&self) -> &[Point2d] {
        &self.boundary
    }

    /// 细胞核边界顶点 (凸包顺序, 不闭合). 没有细胞核时为空.
    #[inline]
    pub fn nucleus(&self) -> &[Point2d] {
        &self.nucleus
    }

    /// `cell_summary` 中的一行: 细胞质心 x/y, 细胞面积, 细胞核质心 x/y,
    /// 细胞核面积, z 层级.
    ///
    /// 细胞核的质心与面积沿用细胞本身的值.
    pub fn summary_row(&self) -> [f64; crate::consts::CELL_SUMMARY_COLUMNS] {
        let (cx, cy) = self.centroid;
        [cx, cy, self.area, cx, cy, self.area, self.z_level]
    }
}

/// 抽取统计.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// 不同细胞分组的个数 (不含未分配).
    pub groups: usize,

    /// 未分配到细胞的转录本个数.
    pub unassigned_rows: usize,

    /// 因转录本个数不足被丢弃的细胞数.
    pub too_few_transcripts: usize,

    /// 因凸包退化被丢弃的细胞数.
    pub degenerate: usize,

    /// 因面积越界被丢弃的细胞数.
    pub area_out_of_range: usize,

    /// 有细胞核边界的细胞数.
    pub with_nucleus: usize,
}

impl ExtractStats {
    /// 被丢弃的细胞总数.
    #[inline]
    pub fn rejected(&self) -> usize {
        self.too_few_transcripts + self.degenerate + self.area_out_of_range
    }
}

/// 抽取结果. 行顺序即稠密 id 顺序, 第 `i` 行的 id 为 `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct CellSet {
    cells: Vec<Cell>,
    stats: ExtractStats,
}

impl CellSet {
    /// 保留的细胞.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// 保留的细胞个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// 是否没有任何细胞被保留.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// 抽取统计.
    #[inline]
    pub fn stats(&self) -> &ExtractStats {
        &self.stats
    }

    /// 稠密 id -> 原始文本标识符.
    #[inline]
    pub fn original_of(&self, id: u32) -> Option<&str> {
        let index = (id as usize).checked_sub(1)?;
        self.cells.get(index).map(Cell::original)
    }

    /// 按行顺序迭代原始文本标识符.
    #[inline]
    pub fn originals(&self) -> impl ExactSizeIterator<Item = &str> {
        self.cells.iter().map(Cell::original)
    }
}

/// 细胞边界抽取器.
#[derive(Debug, Clone)]
pub struct CellExtractor<B = Qhull> {
    builder: B,
    area: AreaRange,
    unassigned: String,
}

impl CellExtractor<Qhull> {
    /// 使用 qhull 凸包初始化.
    #[inline]
    pub fn new(area: AreaRange) -> Self {
        Self::with_builder(Qhull, area)
    }
}

impl<B: BoundaryBuilder> CellExtractor<B> {
    /// 使用给定的边界算法初始化.
    pub fn with_builder(builder: B, area: AreaRange) -> Self {
        Self {
            builder,
            area,
            unassigned: columns::UNASSIGNED.to_owned(),
        }
    }

    /// 设置 "未分配" 哨兵值. 空值总是视为未分配.
    pub fn unassigned<S: Into<String>>(mut self, sentinel: S) -> Self {
        self.unassigned = sentinel.into();
        self
    }

    /// 执行抽取.
    pub fn extract(&self, table: &TranscriptTable) -> CellSet {
        let mut stats = ExtractStats::default();

        // 按首次出现的顺序分组.
        let mut slot_of: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        for row in 0..table.len() {
            let id = match table.cell_id(row) {
                Some(id) if id != self.unassigned => id,
                _ => {
                    stats.unassigned_rows += 1;
                    continue;
                }
            };
            let slot = *slot_of.entry(id).or_insert_with(|| {
                groups.push((id, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(row);
        }
        stats.groups = groups.len();

        let mut cells = Vec::new();
        for (original, rows) in groups {
            match self.build_cell(table, original, &rows, cells.len() as u32 + 1) {
                Ok(cell) => {
                    if !cell.nucleus.is_empty() {
                        stats.with_nucleus += 1;
                    }
                    cells.push(cell);
                }
                Err(Rejection::TooFewTranscripts(n)) => {
                    debug!("cell `{original}`: {n} transcripts, skipped");
                    stats.too_few_transcripts += 1;
                }
                Err(Rejection::Boundary(e)) => {
                    debug!("cell `{original}`: boundary failed ({e}), skipped");
                    stats.degenerate += 1;
                }
                Err(Rejection::Area(area)) => {
                    debug!("cell `{original}`: area {area} out of range, skipped");
                    stats.area_out_of_range += 1;
                }
            }
        }

        info!(
            "Kept {} of {} cells ({} too small, {} degenerate, {} out of area range)",
            cells.len(),
            stats.groups,
            stats.too_few_transcripts,
            stats.degenerate,
            stats.area_out_of_range
        );
        CellSet { cells, stats }
    }

    /// 构建单个细胞. 只有通过全部过滤时才会用到 `id`.
    fn build_cell(
        &self,
        table: &TranscriptTable,
        original: &str,
        rows: &[usize],
        id: u32,
    ) -> Result<Cell, Rejection> {
        if rows.len() < MIN_CELL_TRANSCRIPTS {
            return Err(Rejection::TooFewTranscripts(rows.len()));
        }

        let points: Vertices = rows.iter().map(|&r| table.point(r)).collect();
        let boundary = self
            .builder
            .convex_boundary(&points)
            .map_err(Rejection::Boundary)?;
        if !self.area.contains(boundary.area()) {
            return Err(Rejection::Area(boundary.area()));
        }

        let n = rows.len() as f64;
        let centroid = (
            points.iter().map(|p| p.0).sum::<f64>() / n,
            points.iter().map(|p| p.1).sum::<f64>() / n,
        );
        let mean_z = rows.iter().map(|&r| table.z(r)).sum::<f64>() / n;
        let z_level = (mean_z / Z_LEVEL_STEP).floor() * Z_LEVEL_STEP;

        let nucleus = self.nucleus_of(table, original, rows);

        Ok(Cell {
            id,
            original: original.to_owned(),
            centroid,
            area: boundary.area(),
            z_level,
            boundary: boundary.into_exterior(),
            nucleus,
        })
    }

    /// 细胞核边界: 仅在与细胞核重叠的转录本不少于 3 个且凸包存在时非空.
    fn nucleus_of(&self, table: &TranscriptTable, original: &str, rows: &[usize]) -> Vertices {
        let points: Vertices = rows
            .iter()
            .filter(|&&r| table.overlaps_nucleus(r))
            .map(|&r| table.point(r))
            .collect();
        if points.len() < MIN_NUCLEUS_TRANSCRIPTS {
            return Vertices::new();
        }
        match self.builder.convex_boundary(&points) {
            Ok(b) => b.hull_indices().iter().map(|&i| points[i]).collect(),
            Err(e) => {
                debug!("cell `{original}`: nucleus boundary failed ({e})");
                Vertices::new()
            }
        }
    }
}

/// 细胞被丢弃的原因.
#[derive(Debug, Copy, Clone)]
enum Rejection {
    TooFewTranscripts(usize),
    Boundary(BoundaryError),
    Area(f64),
}
