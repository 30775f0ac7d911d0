//! 转换流程错误.

use crate::descriptor::DescriptorError;
use crate::sparse::SparseEncodeError;
use crate::store::StoreError;
use crate::table::TableError;
use std::path::PathBuf;
use thiserror::Error;

/// 整个转换流程的致命错误.
///
/// 单个细胞层面的失败 (凸包退化、标识符无法解码) 不会出现在这里,
/// 它们只被记录为警告.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// 源目录缺少必需的文件.
    #[error("required source file `{}` does not exist", .0.display())]
    MissingSource(PathBuf),

    /// 输入表错误.
    #[error("cannot load input table")]
    Table(#[from] TableError),

    /// 容器读写错误.
    #[error("cannot read or write array container")]
    Store(#[from] StoreError),

    /// 描述文件错误.
    #[error("cannot generate experiment file")]
    Descriptor(#[from] DescriptorError),

    /// 分组标签不稠密.
    #[error("cannot encode grouping `{grouping}`")]
    Sparse {
        /// 分组名.
        grouping: String,
        /// 原因.
        #[source]
        source: SparseEncodeError,
    },

    /// 其他 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 转换结果.
pub type ConvertResult<T> = Result<T, ConvertError>;
