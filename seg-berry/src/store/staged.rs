//! 暂存文件.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 写在目标路径旁 `{name}.partial` 上的文件.
///
/// 调用 [`StagedFile::commit`] 后才重命名为目标文件; 未提交就被丢弃时临时文件会被删除.
/// 多个输出可以先全部暂存, 最后再依次提交.
#[derive(Debug)]
pub struct StagedFile {
    partial: PathBuf,
    dest: PathBuf,
    committed: bool,
}

impl StagedFile {
    /// 为 `dest` 准备暂存路径. 不会创建任何文件.
    pub fn new<P: AsRef<Path>>(dest: P) -> Self {
        let dest = dest.as_ref().to_owned();
        let mut partial = dest.clone().into_os_string();
        partial.push(".partial");
        Self {
            partial: PathBuf::from(partial),
            dest,
            committed: false,
        }
    }

    /// 临时文件路径.
    #[inline]
    pub fn partial_path(&self) -> &Path {
        &self.partial
    }

    /// 目标路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.dest
    }

    /// 将临时文件重命名为目标文件.
    pub fn commit(mut self) -> io::Result<PathBuf> {
        fs::rename(&self.partial, &self.dest)?;
        self.committed = true;
        Ok(self.dest.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.partial);
        }
    }
}
