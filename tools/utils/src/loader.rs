//! 源目录定位.

use std::env;
use std::path::{Path, PathBuf};

/// 指定源目录的环境变量.
pub const SOURCE_DIR_ENV: &str = "SEG2EXPLORER_SOURCE_DIR";

/// 获取 `$HOME/dataset` 下的子路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    ans.extend(it);
    Some(ans)
}

/// 获取源目录.
///
/// 1. 若环境变量 `$SEG2EXPLORER_SOURCE_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/xenium`;
/// 3. 无法确定家目录时返回 `None`.
pub fn source_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(SOURCE_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["xenium"]),
    }
}
