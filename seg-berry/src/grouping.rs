//! 分组表与保留细胞的关联.
//!
//! 以左连接的方式把分组表挂到保留细胞上: 没有匹配行的细胞在所有分组中都是无标签 (`0`).
//! 每个分组的标签按其 (关联后的) 非空取值排序后从 1 开始编号.

use crate::codec;
use crate::extract::CellSet;
use crate::table::{GroupingKeys, GroupingTable, LabelValue};
use log::warn;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// 一个分组在保留细胞上的标签.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    name: String,
    labels: Vec<u32>,
    group_names: Vec<String>,
}

impl Grouping {
    /// 分组名.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 每个细胞 (按行顺序) 的标签, `0` 代表无标签.
    #[inline]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// 按标签编号排列的标签名. 第 `i` 个元素对应标签 `i + 1`.
    #[inline]
    pub fn group_names(&self) -> &[String] {
        &self.group_names
    }

    /// 无标签细胞个数.
    #[inline]
    pub fn unlabeled(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 0).count()
    }
}

/// 建立 "关联键 -> 分组表行号" 索引. 重复键以第一次出现的为准.
fn first_row_index<K: Eq + Hash + Clone>(
    keys: &[Option<K>],
    duplicates: &mut usize,
) -> HashMap<K, usize> {
    let mut index = HashMap::with_capacity(keys.len());
    for (row, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            if index.contains_key(key) {
                *duplicates += 1;
            } else {
                index.insert(key.clone(), row);
            }
        }
    }
    index
}

/// 细胞标识符对应的数值关联键.
///
/// 先按 `PREFIX-SUFFIX` 解码取前缀数值; 标识符本身就是十进制整数时直接使用.
fn numeric_key(id: &str) -> Result<u32, codec::DecodeError> {
    codec::decode(id)
        .map(|c| c.value)
        .or_else(|e| id.trim().parse::<u32>().map_err(|_| e))
}

/// 求每个保留细胞在分组表中匹配的行.
fn match_rows(cells: &CellSet, table: &GroupingTable) -> Vec<Option<usize>> {
    let mut duplicates = 0usize;
    let rows = match table.keys() {
        GroupingKeys::Text(keys) => {
            let index = first_row_index(keys, &mut duplicates);
            cells
                .originals()
                .map(|id| index.get(id).copied())
                .collect()
        }
        GroupingKeys::Numeric(keys) => {
            let index = first_row_index(keys, &mut duplicates);
            cells
                .originals()
                .map(|id| match numeric_key(id) {
                    Ok(key) => index.get(&key).copied(),
                    Err(e) => {
                        warn!("cannot decode cell id for grouping lookup: {e}; left unlabeled");
                        None
                    }
                })
                .collect()
        }
    };
    if duplicates > 0 {
        warn!("grouping table has {duplicates} duplicated keys; the first row of each key is used");
    }
    rows
}

/// 将 `table` 关联到 `cells` 上, 每个标签列产生一个 [`Grouping`].
pub fn join_groupings(cells: &CellSet, table: &GroupingTable) -> Vec<Grouping> {
    let rows = match_rows(cells, table);

    table
        .columns()
        .iter()
        .map(|column| {
            let joined: Vec<Option<&LabelValue>> = rows
                .iter()
                .map(|row| row.and_then(|r| column.values()[r].as_ref()))
                .collect();

            let sorted: BTreeSet<&LabelValue> = joined.iter().flatten().copied().collect();
            let label_of: HashMap<&LabelValue, u32> = sorted
                .iter()
                .enumerate()
                .map(|(i, v)| (*v, i as u32 + 1))
                .collect();

            Grouping {
                name: column.name().to_owned(),
                labels: joined
                    .iter()
                    .map(|v| v.and_then(|v| label_of.get(v).copied()).unwrap_or(0))
                    .collect(),
                group_names: sorted.iter().map(|v| v.to_string()).collect(),
            }
        })
        .collect()
}
