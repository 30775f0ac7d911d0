//! zip 包装的 zarr v2 容器.
//!
//! 布局与 Explorer 读取的 `*.zarr.zip` 一致:
//!
//! - 每个组有一个 `.zgroup`, 可选一个 `.zattrs`;
//! - 每个数组有一个 `.zarray` 和唯一的一个块 (`0`, `0.0`, `0.0.0` ...),
//!   块内容为 C 顺序、小端、无压缩的原始字节;
//! - 含零长度维度的数组只写元数据.
//!
//! zip 条目本身也不压缩.

mod reader;
mod staged;
mod writer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use reader::{read_root_attrs, ZarrZipReader};
pub use staged::StagedFile;
pub use writer::ZarrZipWriter;

/// 容器 JSON 属性.
pub type Attrs = serde_json::Map<String, serde_json::Value>;

/// zarr 格式版本.
const ZARR_FORMAT: u32 = 2;

/// 容器读写错误.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// zip 归档错误.
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// 元数据 JSON 错误.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// `.zattrs` 不是 JSON 对象.
    #[error("attributes at `{0}` are not a JSON object")]
    NotAnObject(String),

    /// 读取数组时类型不符.
    #[error("array `{path}` has dtype {found}, expected {expected}")]
    DtypeMismatch {
        /// 数组路径.
        path: String,
        /// 期望类型.
        expected: &'static str,
        /// 实际类型.
        found: String,
    },

    /// 块长度与形状不符.
    #[error("array `{0}` has a chunk of unexpected length")]
    BadChunk(String),

    /// 数组使用了压缩器, 本 crate 只读取无压缩的块.
    #[error("array `{0}` is compressed")]
    Compressed(String),
}

/// 容器读写结果.
pub type StoreResult<T> = Result<T, StoreError>;

/// 可以写入容器的数组元素.
pub trait Element: Copy {
    /// zarr `dtype` 字符串.
    const DTYPE: &'static str;

    /// 字节宽度.
    const WIDTH: usize;

    /// 以小端序追加到 `buf`.
    fn write_le(self, buf: &mut Vec<u8>);

    /// 从 `WIDTH` 个小端字节读取.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_element {
    ($($ty: ty => $dtype: expr),+) => {
        $(
            impl Element for $ty {
                const DTYPE: &'static str = $dtype;
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn write_le(self, buf: &mut Vec<u8>) {
                    buf.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )+
    };
}

impl_element!(u32 => "<u4", i32 => "<i4", f32 => "<f4", f64 => "<f8");

/// `.zarray` 文档.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMeta {
    /// 固定为 2.
    pub zarr_format: u32,

    /// 数组形状.
    pub shape: Vec<usize>,

    /// 块形状. 本 crate 写出的数组只有一个块, 零长度维度记为 1.
    pub chunks: Vec<usize>,

    /// 元素类型.
    pub dtype: String,

    /// 压缩器. 总是 `null`.
    pub compressor: Option<serde_json::Value>,

    /// 填充值.
    pub fill_value: serde_json::Value,

    /// 过滤器. 总是 `null`.
    pub filters: Option<serde_json::Value>,

    /// 内存顺序.
    pub order: String,
}

impl ArrayMeta {
    /// 单块、无压缩的 C 顺序数组.
    pub fn single_chunk<T: Element>(shape: &[usize]) -> Self {
        Self {
            zarr_format: ZARR_FORMAT,
            shape: shape.to_vec(),
            chunks: shape.iter().map(|&s| s.max(1)).collect(),
            dtype: T::DTYPE.to_owned(),
            compressor: None,
            fill_value: serde_json::Value::from(0),
            filters: None,
            order: "C".to_owned(),
        }
    }

    /// 元素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// 唯一块的键名, 如 `0.0.0`.
    pub fn chunk_key(&self) -> String {
        vec!["0"; self.shape.len().max(1)].join(".")
    }
}

/// 组内条目的完整键名. `group` 为空代表根.
pub(crate) fn entry_key(group: &str, name: &str) -> String {
    let group = group.trim_matches('/');
    if group.is_empty() {
        name.to_owned()
    } else {
        format!("{group}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_json_layout() {
        let meta = ArrayMeta::single_chunk::<f32>(&[2, 0, 128, 2]);
        assert_eq!(meta.chunks, vec![2, 1, 128, 2]);
        assert_eq!(meta.chunk_key(), "0.0.0.0");
        assert_eq!(meta.size(), 0);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["dtype"], "<f4");
        assert_eq!(json["zarr_format"], 2);
        assert!(json["compressor"].is_null());
        assert!(json["filters"].is_null());
        assert_eq!(json["order"], "C");
    }

    #[test]
    fn test_element_le_roundtrip() {
        let mut buf = vec![];
        (-2i32).write_le(&mut buf);
        1.5f32.write_le(&mut buf);
        assert_eq!(buf.len(), 8);
        assert_eq!(i32::read_le(&buf[..4]), -2);
        assert_eq!(f32::read_le(&buf[4..]), 1.5);
    }

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key("", ".zgroup"), ".zgroup");
        assert_eq!(entry_key("/cell_groups/0/", "indices"), "cell_groups/0/indices");
    }
}
