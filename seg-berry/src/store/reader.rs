//! 容器读取.

use super::{entry_key, ArrayMeta, Attrs, Element, StoreError, StoreResult};
use ndarray::{ArrayD, IxDyn};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;

/// `*.zarr.zip` 只读访问.
pub struct ZarrZipReader {
    archive: ZipArchive<File>,
}

impl ZarrZipReader {
    /// 打开容器.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self {
            archive: ZipArchive::new(file)?,
        })
    }

    /// 归档中的全部条目名.
    pub fn names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_owned).collect()
    }

    /// 读取条目. 条目不存在时返回 `Ok(None)`.
    fn entry(&mut self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(key) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    /// 读取组 `group` 的属性. 没有 `.zattrs` 时为空.
    pub fn attrs(&mut self, group: &str) -> StoreResult<Attrs> {
        match self.entry(&entry_key(group, ".zattrs"))? {
            None => Ok(Attrs::new()),
            Some(bytes) => match serde_json::from_slice(&bytes)? {
                serde_json::Value::Object(map) => Ok(map),
                _ => Err(StoreError::NotAnObject(group.to_owned())),
            },
        }
    }

    /// 读取数组元数据.
    pub fn array_meta(&mut self, path: &str) -> StoreResult<ArrayMeta> {
        let key = entry_key(path, ".zarray");
        let bytes = self
            .entry(&key)?
            .ok_or(StoreError::Zip(ZipError::FileNotFound))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// 读取单块、无压缩的数组. 块缺失时按填充值 0 处理.
    pub fn read_array<T: Element + Default>(&mut self, path: &str) -> StoreResult<ArrayD<T>> {
        let meta = self.array_meta(path)?;
        if meta.dtype != T::DTYPE {
            return Err(StoreError::DtypeMismatch {
                path: path.to_owned(),
                expected: T::DTYPE,
                found: meta.dtype,
            });
        }
        if meta.compressor.is_some() {
            return Err(StoreError::Compressed(path.to_owned()));
        }

        let size = meta.size();
        let data = match self.entry(&entry_key(path, &meta.chunk_key()))? {
            Some(bytes) if bytes.len() == size * T::WIDTH => {
                bytes.chunks_exact(T::WIDTH).map(T::read_le).collect()
            }
            Some(_) => return Err(StoreError::BadChunk(path.to_owned())),
            None => vec![T::default(); size],
        };
        ArrayD::from_shape_vec(IxDyn(&meta.shape), data)
            .map_err(|_| StoreError::BadChunk(path.to_owned()))
    }
}

/// 读取容器根组属性.
pub fn read_root_attrs<P: AsRef<Path>>(path: P) -> StoreResult<Attrs> {
    ZarrZipReader::open(path)?.attrs("")
}
