//! 分组成员关系的类 CSR 稀疏编码.
//!
//! 对一个分组, 输入为每个细胞 (按数组行顺序) 的标签, `0` 代表无标签,
//! `1..=K` 代表各个类别. 输出:
//!
//! - `indices`: 按标签升序, 依次拼接持有该标签的所有行号 (行内保持升序);
//!   最后追加与无标签细胞数量相同个数的 `0`.
//! - `indptr`: 第 `L - 1` 个元素为标签 `L` 的行号在 `indices` 中的起始偏移.
//!
//! 末尾那段 `0` 只记录无标签细胞的个数, 并不能据此还原它们的行号.
//! Explorer 读取的就是这个形状, 因此原样保留.

use itertools::Itertools;
use ndarray::Array1;
use std::collections::BTreeSet;
use thiserror::Error;

/// 稀疏编码错误.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum SparseEncodeError {
    /// 标签不连续. `indptr` 按标签值索引, 所以标签必须恰好为 `1..=K`.
    ///
    /// `label` 是越界的标签, `distinct` 是不同非零标签的个数.
    #[error("label {label} exceeds the {distinct} distinct labels present")]
    LabelGap {
        /// 越界的标签.
        label: u32,
        /// 不同非零标签个数.
        distinct: usize,
    },
}

/// 一个分组的稀疏编码结果.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseGroups {
    indices: Array1<u32>,
    indptr: Array1<u32>,
}

impl SparseGroups {
    /// `indices` 数组.
    #[inline]
    pub fn indices(&self) -> &Array1<u32> {
        &self.indices
    }

    /// `indptr` 数组.
    #[inline]
    pub fn indptr(&self) -> &Array1<u32> {
        &self.indptr
    }

    /// 不同非零标签个数.
    #[inline]
    pub fn group_len(&self) -> usize {
        self.indptr.len()
    }

    /// 标签 `label` (从 1 开始) 对应的行号.
    ///
    /// 最后一个标签的行号延伸到无标签块之前, 因此需要额外给出无标签个数.
    pub fn rows_of(&self, label: u32, unlabeled: usize) -> Option<&[u32]> {
        let k = label.checked_sub(1)? as usize;
        let start = *self.indptr.get(k)? as usize;
        let end = match self.indptr.get(k + 1) {
            Some(&next) => next as usize,
            None => self.indices.len().checked_sub(unlabeled)?,
        };
        self.indices.as_slice()?.get(start..end)
    }
}

/// 对单个分组进行编码. 每个分组必须独立调用.
pub fn encode_groups(labels: &[u32]) -> Result<SparseGroups, SparseEncodeError> {
    let clusters: BTreeSet<u32> = labels.iter().copied().filter(|&l| l != 0).collect();
    let distinct = clusters.len();

    let mut indptr = vec![0u32; distinct];
    let mut indices: Vec<u32> = Vec::with_capacity(labels.len());

    for label in clusters {
        if label as usize > distinct {
            return Err(SparseEncodeError::LabelGap { label, distinct });
        }
        indptr[label as usize - 1] = indices.len() as u32;
        indices.extend(labels.iter().positions(|&l| l == label).map(|p| p as u32));
    }

    let unlabeled = labels.iter().filter(|&&l| l == 0).count();
    indices.extend(std::iter::repeat(0u32).take(unlabeled));

    Ok(SparseGroups {
        indices: Array1::from(indices),
        indptr: Array1::from(indptr),
    })
}
