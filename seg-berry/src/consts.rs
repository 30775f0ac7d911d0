//! 通用常量.

/// 每个多边形在定长顶点数组中占用的顶点个数.
pub const MAX_VERTICES: usize = 128;

/// 一个细胞至少需要的转录本个数. 少于该值的细胞直接丢弃.
pub const MIN_CELL_TRANSCRIPTS: usize = 5;

/// 计算细胞核子边界至少需要的、与细胞核重叠的转录本个数.
pub const MIN_NUCLEUS_TRANSCRIPTS: usize = 3;

/// z 层级的分桶步长.
pub const Z_LEVEL_STEP: f64 = 3.0;

/// `cell_id` 数组第二列中的数据集分区标记.
pub const DATASET_PARTITION: u32 = 1;

/// 顶点个数数组中的固定偏移. Explorer 读取时要求每个计数额外加一.
pub const VERTEX_COUNT_BIAS: i32 = 1;

/// `cell_summary` 数组的列数.
pub const CELL_SUMMARY_COLUMNS: usize = 7;

/// 分组容器的格式版本.
pub mod version {
    /// 主版本号.
    pub const MAJOR: u32 = 1;

    /// 次版本号.
    pub const MINOR: u32 = 0;
}

/// 文件名与描述文件中的键.
pub mod names {
    /// 源目录下, 已有细胞容器的文件名.
    pub const SOURCE_CELLS: &str = "cells.zarr.zip";

    /// 源目录下, 实验描述模板的文件名.
    pub const SOURCE_EXPERIMENT: &str = "experiment.xenium";

    /// zarr 容器文件名后缀.
    pub const ZARR_ZIP_SUFFIX: &str = ".zarr.zip";

    /// 默认输出的几何容器前缀.
    pub const DEFAULT_CELLS: &str = "seg_cells";

    /// 默认输出的分组容器前缀.
    pub const DEFAULT_ANALYSIS: &str = "seg_analysis";

    /// 默认输出的实验描述文件名.
    pub const DEFAULT_EXPERIMENT: &str = "seg_experiment.xenium";

    /// 未提供分组表时, 自动合成的分组列名.
    pub const DEFAULT_GROUPING: &str = "default";

    /// 自动合成的分组中, 所有细胞共用的标签.
    pub const DEFAULT_GROUP_LABEL: &str = "seg";

    /// 分组容器中的分组根节点.
    pub const CELL_GROUPS: &str = "cell_groups";
}

/// 默认列名.
pub mod columns {
    /// 细胞分配列.
    pub const CELL_ID: &str = "seg_cell_id";

    /// x 坐标列.
    pub const X: &str = "x_location";

    /// y 坐标列.
    pub const Y: &str = "y_location";

    /// z 坐标列.
    pub const Z: &str = "z_location";

    /// 是否与细胞核重叠的标记列.
    pub const NUCLEUS: &str = "overlaps_nucleus";

    /// 未分配到任何细胞的转录本的哨兵值.
    pub const UNASSIGNED: &str = "UNASSIGNED";
}
