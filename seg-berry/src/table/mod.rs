//! 输入表格: 转录本分配表与分组 (注释) 表.
//!
//! 两张表在处理开始前会完整加载进内存. 既可以由 parquet 文件读取
//! (默认开启的 `parquet` feature), 也可以直接在内存中构建.

use crate::Point2d;
use ordered_float::OrderedFloat;
use std::fmt;
use thiserror::Error;

/// 表格读取或构建错误. 对整个转换而言是致命的.
#[derive(Debug, Error)]
pub enum TableError {
    /// 缺少必需的列.
    #[error("missing column `{0}`")]
    MissingColumn(String),

    /// 列长度不一致.
    #[error("column `{column}` has {found} rows, expected {expected}")]
    LengthMismatch {
        /// 列名.
        column: String,
        /// 期望行数.
        expected: usize,
        /// 实际行数.
        found: usize,
    },

    /// 列类型无法转换.
    #[error("column `{column}` has unsupported type {data_type}")]
    UnsupportedType {
        /// 列名.
        column: String,
        /// 类型描述.
        data_type: String,
    },

    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// parquet 解码错误.
    #[cfg(feature = "parquet")]
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    /// arrow 类型转换错误.
    #[cfg(feature = "parquet")]
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

/// 读取转录本表时使用的列名.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnNames {
    /// 细胞分配列, 同时也是分组表的关联列.
    pub cell_id: String,

    /// x 坐标列.
    pub x: String,

    /// y 坐标列.
    pub y: String,

    /// z 坐标列. 该列可以缺失.
    pub z: String,

    /// 是否与细胞核重叠的标记列.
    pub nucleus: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        use crate::consts::columns::*;
        Self {
            cell_id: CELL_ID.to_owned(),
            x: X.to_owned(),
            y: Y.to_owned(),
            z: Z.to_owned(),
            nucleus: NUCLEUS.to_owned(),
        }
    }
}

/// 单个转录本记录. 便于在内存中构建表格.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptRow {
    /// 所属细胞. `None` 代表未分配.
    pub cell_id: Option<String>,

    /// x 坐标.
    pub x: f64,

    /// y 坐标.
    pub y: f64,

    /// z 坐标.
    pub z: f64,

    /// 是否与细胞核重叠.
    pub overlaps_nucleus: bool,
}

impl TranscriptRow {
    /// 初始化一个已分配到 `cell_id` 的转录本.
    pub fn new(cell_id: &str, (x, y): Point2d, z: f64, overlaps_nucleus: bool) -> Self {
        Self {
            cell_id: Some(cell_id.to_owned()),
            x,
            y,
            z,
            overlaps_nucleus,
        }
    }
}

/// 列式存储的转录本表.
#[derive(Debug, Clone, Default)]
pub struct TranscriptTable {
    cell_ids: Vec<Option<String>>,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Option<Vec<f64>>,
    nucleus: Vec<bool>,
}

impl TranscriptTable {
    /// 由各列构建. `z` 可以缺失, 此时所有 z 坐标视为 `0`.
    ///
    /// 各列长度必须一致, 否则返回 `Err`.
    pub fn new(
        cell_ids: Vec<Option<String>>,
        x: Vec<f64>,
        y: Vec<f64>,
        z: Option<Vec<f64>>,
        nucleus: Vec<bool>,
    ) -> Result<Self, TableError> {
        let expected = cell_ids.len();
        let check = |column: &str, found: usize| {
            if found == expected {
                Ok(())
            } else {
                Err(TableError::LengthMismatch {
                    column: column.to_owned(),
                    expected,
                    found,
                })
            }
        };
        check("x", x.len())?;
        check("y", y.len())?;
        if let Some(z) = z.as_ref() {
            check("z", z.len())?;
        }
        check("nucleus", nucleus.len())?;

        Ok(Self {
            cell_ids,
            x,
            y,
            z,
            nucleus,
        })
    }

    /// 由逐行记录构建.
    pub fn from_rows<I: IntoIterator<Item = TranscriptRow>>(rows: I) -> Self {
        let mut table = Self {
            z: Some(vec![]),
            ..Self::default()
        };
        for row in rows {
            table.cell_ids.push(row.cell_id);
            table.x.push(row.x);
            table.y.push(row.y);
            if let Some(z) = table.z.as_mut() {
                z.push(row.z);
            }
            table.nucleus.push(row.overlaps_nucleus);
        }
        table
    }

    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    /// 是否为空表.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// 第 `row` 行所属细胞.
    #[inline]
    pub fn cell_id(&self, row: usize) -> Option<&str> {
        self.cell_ids[row].as_deref()
    }

    /// 第 `row` 行平面坐标.
    #[inline]
    pub fn point(&self, row: usize) -> Point2d {
        (self.x[row], self.y[row])
    }

    /// 第 `row` 行 z 坐标. 没有 z 列时为 `0`.
    #[inline]
    pub fn z(&self, row: usize) -> f64 {
        self.z.as_ref().map_or(0.0, |z| z[row])
    }

    /// 第 `row` 行是否与细胞核重叠.
    #[inline]
    pub fn overlaps_nucleus(&self, row: usize) -> bool {
        self.nucleus[row]
    }
}

/// 分组标签取值. 同一列中的取值类型一致, 以保证排序符合直觉
/// (数值列按数值大小排序, 而不是字典序).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelValue {
    /// 整数标签.
    Int(i64),

    /// 浮点标签.
    Float(OrderedFloat<f64>),

    /// 文本标签.
    Text(String),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Int(v) => write!(f, "{v}"),
            LabelValue::Float(v) => write!(f, "{}", v.0),
            LabelValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for LabelValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<i64> for LabelValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// 分组表的关联键.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingKeys {
    /// 与转录本表相同的文本标识符.
    Text(Vec<Option<String>>),

    /// Explorer 数值标识符 (文本标识符前缀解码后的值).
    Numeric(Vec<Option<u32>>),
}

impl GroupingKeys {
    /// 行数.
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            GroupingKeys::Text(v) => v.len(),
            GroupingKeys::Numeric(v) => v.len(),
        }
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 一个分组列.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelColumn {
    name: String,
    values: Vec<Option<LabelValue>>,
}

impl LabelColumn {
    /// 初始化. `None` 代表无标签.
    pub fn new<S: Into<String>>(name: S, values: Vec<Option<LabelValue>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// 列名, 即分组名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 各行标签.
    #[inline]
    pub fn values(&self) -> &[Option<LabelValue>] {
        &self.values
    }
}

/// 分组 (聚类注释) 表: 一个关联键列加若干标签列.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingTable {
    keys: GroupingKeys,
    columns: Vec<LabelColumn>,
}

impl GroupingTable {
    /// 初始化. 所有标签列的长度都必须与关联键一致.
    pub fn new(keys: GroupingKeys, columns: Vec<LabelColumn>) -> Result<Self, TableError> {
        let expected = keys.len();
        if let Some(c) = columns.iter().find(|c| c.values.len() != expected) {
            return Err(TableError::LengthMismatch {
                column: c.name.clone(),
                expected,
                found: c.values.len(),
            });
        }
        Ok(Self { keys, columns })
    }

    /// 为给定细胞合成只有一个分组的表, 所有细胞共享同一个标签.
    pub fn uniform<'a, I: IntoIterator<Item = &'a str>>(ids: I, name: &str, label: &str) -> Self {
        let keys: Vec<Option<String>> = ids.into_iter().map(|s| Some(s.to_owned())).collect();
        let values = vec![Some(LabelValue::from(label)); keys.len()];
        Self {
            keys: GroupingKeys::Text(keys),
            columns: vec![LabelColumn::new(name, values)],
        }
    }

    /// 关联键.
    #[inline]
    pub fn keys(&self) -> &GroupingKeys {
        &self.keys
    }

    /// 标签列.
    #[inline]
    pub fn columns(&self) -> &[LabelColumn] {
        &self.columns
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "parquet")] {
        mod parquet_io;

        pub use parquet_io::{read_grouping_table, read_transcript_table};
    }
}
