//! 实验描述文件 (`*.xenium`).
//!
//! 从源目录的模板复制, 删除形态学图像的引用, 并把细胞与分组容器的文件名替换为新生成的文件.

use crate::store::StagedFile;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// 需要删除的图像条目.
const IMAGE_KEYS: [&str; 2] = ["morphology_filepath", "morphology_focus_filepath"];

const IMAGES: &str = "images";
const EXPLORER_FILES: &str = "xenium_explorer_files";
const CELLS_KEY: &str = "cells_zarr_filepath";
const CELL_FEATURES_KEY: &str = "cell_features_zarr_filepath";
const ANALYSIS_KEY: &str = "analysis_zarr_filepath";

/// 描述文件错误.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// 底层 I/O 错误.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON 解析或序列化错误.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// 期望 JSON 对象的位置不是对象.
    #[error("`{0}` is not a JSON object")]
    NotAnObject(&'static str),
}

/// 实验描述文件.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentFile {
    doc: Map<String, Value>,
}

impl ExperimentFile {
    /// 读取模板.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DescriptorError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        Self::from_value(serde_json::from_reader(reader)?)
    }

    /// 从 JSON 值构建. 顶层必须是对象.
    pub fn from_value(value: Value) -> Result<Self, DescriptorError> {
        match value {
            Value::Object(doc) => Ok(Self { doc }),
            _ => Err(DescriptorError::NotAnObject("<root>")),
        }
    }

    /// 底层 JSON 对象.
    #[inline]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.doc
    }

    /// 取出 (必要时创建) 顶层对象 `key`.
    fn object_mut(
        &mut self,
        key: &'static str,
    ) -> Result<&mut Map<String, Value>, DescriptorError> {
        self.doc
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or(DescriptorError::NotAnObject(key))
    }

    /// 删除图像引用, 并将容器文件名替换为 `{cells}.zarr.zip` 与 `{analysis}.zarr.zip`.
    /// `cell_features` 容器引用同样会被删除.
    pub fn retarget(&mut self, cells: &str, analysis: &str) -> Result<(), DescriptorError> {
        use crate::consts::names::ZARR_ZIP_SUFFIX;

        if let Some(images) = self.doc.get_mut(IMAGES) {
            let images = images
                .as_object_mut()
                .ok_or(DescriptorError::NotAnObject(IMAGES))?;
            for key in IMAGE_KEYS {
                images.shift_remove(key);
            }
        }

        let files = self.object_mut(EXPLORER_FILES)?;
        files.insert(CELLS_KEY.to_owned(), format!("{cells}{ZARR_ZIP_SUFFIX}").into());
        files.shift_remove(CELL_FEATURES_KEY);
        files.insert(
            ANALYSIS_KEY.to_owned(),
            format!("{analysis}{ZARR_ZIP_SUFFIX}").into(),
        );
        Ok(())
    }

    /// 以两空格缩进写出到 `path` 旁的临时文件, 由调用者稍后提交.
    pub fn stage<P: AsRef<Path>>(&self, path: P) -> Result<StagedFile, DescriptorError> {
        let staged = StagedFile::new(path);
        let mut w = BufWriter::new(File::create(staged.partial_path())?);
        serde_json::to_writer_pretty(&mut w, &self.doc)?;
        w.into_inner().map_err(|e| e.into_error())?.sync_all()?;
        Ok(staged)
    }

    /// 以两空格缩进写出到 `path`. 先写临时文件再重命名.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DescriptorError> {
        self.stage(path)?.commit()?;
        Ok(())
    }
}

/// 从 `template` 生成新的描述文件, 暂存在 `output` 旁.
///
/// 返回的 [`StagedFile`] 提交后才会出现在 `output`.
pub fn generate_experiment_file<P: AsRef<Path>, Q: AsRef<Path>>(
    template: P,
    output: Q,
    cells: &str,
    analysis: &str,
) -> Result<StagedFile, DescriptorError> {
    let mut experiment = ExperimentFile::open(template)?;
    experiment.retarget(cells, analysis)?;
    experiment.stage(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Value {
        json!({
            "run_name": "demo",
            "images": {
                "morphology_filepath": "morphology.ome.tif",
                "morphology_focus_filepath": "morphology_focus.ome.tif",
                "morphology_mip_filepath": "morphology_mip.ome.tif"
            },
            "xenium_explorer_files": {
                "transcripts_zarr_filepath": "transcripts.zarr.zip",
                "cells_zarr_filepath": "cells.zarr.zip",
                "cell_features_zarr_filepath": "cell_feature_matrix.zarr.zip",
                "analysis_zarr_filepath": "analysis.zarr.zip"
            }
        })
    }

    #[test]
    fn test_retarget() {
        let mut e = ExperimentFile::from_value(template()).unwrap();
        e.retarget("seg_cells", "seg_analysis").unwrap();
        let doc = Value::Object(e.as_map().clone());

        assert_eq!(
            doc["images"],
            json!({ "morphology_mip_filepath": "morphology_mip.ome.tif" })
        );
        let files = &doc["xenium_explorer_files"];
        assert_eq!(files["cells_zarr_filepath"], "seg_cells.zarr.zip");
        assert_eq!(files["analysis_zarr_filepath"], "seg_analysis.zarr.zip");
        assert_eq!(files["transcripts_zarr_filepath"], "transcripts.zarr.zip");
        assert!(files.get("cell_features_zarr_filepath").is_none());
        assert_eq!(doc["run_name"], "demo");
    }

    #[test]
    fn test_retarget_creates_missing_sections() {
        let mut e = ExperimentFile::from_value(json!({})).unwrap();
        e.retarget("a", "b").unwrap();
        assert!(e.as_map().get("images").is_none());
        assert_eq!(
            e.as_map()["xenium_explorer_files"]["cells_zarr_filepath"],
            "a.zarr.zip"
        );

        let mut e = ExperimentFile::from_value(json!({ "images": [] })).unwrap();
        assert!(matches!(
            e.retarget("a", "b"),
            Err(DescriptorError::NotAnObject("images"))
        ));
        assert!(ExperimentFile::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_save_and_failed_template() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("e.xenium");
        ExperimentFile::from_value(template())
            .unwrap()
            .save(&out)
            .unwrap();
        assert!(out.exists());

        let bad = dir.path().join("bad.xenium");
        std::fs::write(&bad, "not json").unwrap();
        let err = generate_experiment_file(&bad, dir.path().join("x.xenium"), "c", "a");
        assert!(matches!(err, Err(DescriptorError::Json(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_generate_file() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("experiment.xenium");
        std::fs::write(&template_path, template().to_string()).unwrap();
        let out = dir.path().join("seg_experiment.xenium");

        let staged = generate_experiment_file(&template_path, &out, "c", "a").unwrap();
        assert!(!out.exists());
        staged.commit().unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("\n  \"images\""));
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["xenium_explorer_files"]["analysis_zarr_filepath"], "a.zarr.zip");
    }
}
