//! 容器写入.

use super::{entry_key, ArrayMeta, Attrs, Element, StagedFile, StoreResult, ZARR_FORMAT};
use log::debug;
use ndarray::{ArrayBase, Data, Dimension};
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `*.zarr.zip` 写入器.
///
/// 内容先写入同目录下的 `{name}.partial`. [`ZarrZipWriter::finish`] 直接重命名为目标文件,
/// [`ZarrZipWriter::stage`] 则交出 [`StagedFile`] 由调用者稍后提交.
/// 未完成就被丢弃时临时文件会被删除, 因此目标路径上不会出现写了一半的容器.
pub struct ZarrZipWriter {
    // 先于 `staged` 析构: 文件关闭后才删除.
    zip: ZipWriter<File>,
    staged: StagedFile,
}

impl ZarrZipWriter {
    /// 创建容器, 并写入根组.
    pub fn create<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let staged = StagedFile::new(path);
        let file = File::create(staged.partial_path())?;
        let mut writer = Self {
            zip: ZipWriter::new(file),
            staged,
        };
        writer.create_group("")?;
        Ok(writer)
    }

    /// 目标路径.
    #[inline]
    pub fn path(&self) -> &Path {
        self.staged.path()
    }

    fn put(&mut self, key: &str, bytes: &[u8]) -> StoreResult<()> {
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(bytes.len() as u64 >= u32::MAX as u64);
        self.zip.start_file(key, options)?;
        self.zip.write_all(bytes)?;
        Ok(())
    }

    /// 写入组 `group` 的 `.zgroup`. 空字符串代表根组.
    pub fn create_group(&mut self, group: &str) -> StoreResult<()> {
        let doc = serde_json::to_vec(&json!({ "zarr_format": ZARR_FORMAT }))?;
        self.put(&entry_key(group, ".zgroup"), &doc)
    }

    /// 写入组 `group` 的 `.zattrs`.
    pub fn write_attrs(&mut self, group: &str, attrs: &Attrs) -> StoreResult<()> {
        let doc = serde_json::to_vec_pretty(attrs)?;
        self.put(&entry_key(group, ".zattrs"), &doc)
    }

    /// 将 `array` 写入 `path`. 元素按逻辑 C 顺序写出, 与内存布局无关.
    pub fn write_array<S, D, T>(&mut self, path: &str, array: &ArrayBase<S, D>) -> StoreResult<()>
    where
        S: Data<Elem = T>,
        D: Dimension,
        T: Element,
    {
        let meta = ArrayMeta::single_chunk::<T>(array.shape());
        self.put(&entry_key(path, ".zarray"), &serde_json::to_vec(&meta)?)?;

        if meta.size() > 0 {
            let mut buf = Vec::with_capacity(meta.size() * T::WIDTH);
            for &v in array.iter() {
                v.write_le(&mut buf);
            }
            self.put(&entry_key(path, &meta.chunk_key()), &buf)?;
        }
        debug!("wrote `{path}` {:?} {}", meta.shape, meta.dtype);
        Ok(())
    }

    /// 完成写入, 但暂不移动到目标路径.
    pub fn stage(mut self) -> StoreResult<StagedFile> {
        let file = self.zip.finish()?;
        file.sync_all()?;
        drop(file);
        Ok(self.staged)
    }

    /// 完成写入, 并将容器移动到目标路径.
    pub fn finish(self) -> StoreResult<PathBuf> {
        Ok(self.stage()?.commit()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ZarrZipReader;
    use ndarray::{array, Array3};

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.zarr.zip");

        let mut w = ZarrZipWriter::create(&path).unwrap();
        w.write_array("ids", &array![[1u32, 1], [2, 1]]).unwrap();
        // 非标准布局也按逻辑顺序写出.
        w.write_array("t", &array![[1i32, 2], [3, 4]].reversed_axes())
            .unwrap();
        w.write_array("empty", &Array3::<f32>::zeros((0, 128, 2)))
            .unwrap();
        w.create_group("g").unwrap();
        let mut attrs = Attrs::new();
        attrs.insert("number_cells".into(), 2.into());
        w.write_attrs("", &attrs).unwrap();
        assert!(!path.exists());
        assert_eq!(w.finish().unwrap(), path);
        assert!(path.exists());

        let mut r = ZarrZipReader::open(&path).unwrap();
        let ids = r.read_array::<u32>("ids").unwrap();
        assert_eq!(ids.shape(), &[2, 2]);
        assert_eq!(ids.iter().copied().collect::<Vec<_>>(), vec![1, 1, 2, 1]);

        let t = r.read_array::<i32>("t").unwrap();
        assert_eq!(t.iter().copied().collect::<Vec<_>>(), vec![1, 3, 2, 4]);

        let empty = r.read_array::<f32>("empty").unwrap();
        assert_eq!(empty.shape(), &[0, 128, 2]);
        assert!(!r.names().contains(&"empty/0.0.0".to_string()));
        assert!(r.names().contains(&"g/.zgroup".to_string()));

        assert_eq!(r.attrs("").unwrap()["number_cells"], 2);
        assert!(r.attrs("g").unwrap().is_empty());
        assert!(r.read_array::<f32>("ids").is_err());
    }

    #[test]
    fn test_staged_writer_commits_later() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.zarr.zip");

        let mut w = ZarrZipWriter::create(&path).unwrap();
        w.write_array("x", &array![1u32, 2]).unwrap();
        let staged = w.stage().unwrap();
        assert!(!path.exists());
        assert!(staged.partial_path().exists());

        assert_eq!(staged.commit().unwrap(), path);
        let mut r = ZarrZipReader::open(&path).unwrap();
        assert_eq!(r.read_array::<u32>("x").unwrap().len(), 2);

        let w = ZarrZipWriter::create(dir.path().join("d.zarr.zip")).unwrap();
        drop(w.stage().unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unfinished_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("b.zarr.zip");
        {
            let mut w = ZarrZipWriter::create(&path).unwrap();
            w.write_array("x", &array![1.0f64, 2.0]).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
