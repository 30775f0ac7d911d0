//! 转换流程.
//!
//! 抽取细胞边界, 打包定长数组, 关联分组并做稀疏编码, 最后在输出目录写出:
//!
//! 1. `{cells}.zarr.zip`: 细胞几何容器;
//! 2. `{analysis}.zarr.zip`: 分组容器;
//! 3. 由源目录模板派生的实验描述文件.

use crate::consts::{self, names, version, DATASET_PARTITION, MAX_VERTICES, VERTEX_COUNT_BIAS};
use crate::descriptor::generate_experiment_file;
use crate::extract::{AreaRange, CellExtractor, CellSet, ExtractStats};
use crate::geometry::{BoundaryBuilder, Qhull};
use crate::grouping::{join_groupings, Grouping};
use crate::pack::pack_vertices;
use crate::sparse::{encode_groups, SparseGroups};
use crate::store::{read_root_attrs, Attrs, StoreResult, ZarrZipWriter};
use crate::table::{ColumnNames, GroupingTable, TranscriptTable};
use crate::{ConvertError, ConvertResult, Vertices};
use log::info;
use ndarray::{Array1, Array2, Array4, Axis};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// 转换参数.
///
/// 使用 [`Default`] 得到默认配置, 再用 `with_*` 方法逐项覆盖.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertSpec {
    columns: ColumnNames,
    unassigned: String,
    area: AreaRange,
    cells_name: String,
    analysis_name: String,
    experiment_name: String,
    max_vertices: usize,
}

impl Default for ConvertSpec {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            unassigned: consts::columns::UNASSIGNED.to_owned(),
            area: AreaRange::default(),
            cells_name: names::DEFAULT_CELLS.to_owned(),
            analysis_name: names::DEFAULT_ANALYSIS.to_owned(),
            experiment_name: names::DEFAULT_EXPERIMENT.to_owned(),
            max_vertices: MAX_VERTICES,
        }
    }
}

impl ConvertSpec {
    /// 设置输入表列名.
    pub fn with_columns(mut self, columns: ColumnNames) -> Self {
        self.columns = columns;
        self
    }

    /// 设置 "未分配" 哨兵值.
    pub fn with_unassigned<S: Into<String>>(mut self, sentinel: S) -> Self {
        self.unassigned = sentinel.into();
        self
    }

    /// 设置面积区间.
    pub fn with_area(mut self, area: AreaRange) -> Self {
        self.area = area;
        self
    }

    /// 设置几何容器名 (不含 `.zarr.zip` 后缀).
    pub fn with_cells_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cells_name = name.into();
        self
    }

    /// 设置分组容器名 (不含 `.zarr.zip` 后缀).
    pub fn with_analysis_name<S: Into<String>>(mut self, name: S) -> Self {
        self.analysis_name = name.into();
        self
    }

    /// 设置输出描述文件名.
    pub fn with_experiment_name<S: Into<String>>(mut self, name: S) -> Self {
        self.experiment_name = name.into();
        self
    }

    /// 设置每个多边形的最大顶点数.
    pub fn with_max_vertices(mut self, max_vertices: usize) -> Self {
        self.max_vertices = max_vertices;
        self
    }

    /// 输入表列名.
    #[inline]
    pub fn columns(&self) -> &ColumnNames {
        &self.columns
    }

    /// 面积区间.
    #[inline]
    pub fn area(&self) -> AreaRange {
        self.area
    }

    /// 最大顶点数.
    #[inline]
    pub fn max_vertices(&self) -> usize {
        self.max_vertices
    }

    fn cells_file(&self) -> String {
        format!("{}{}", self.cells_name, names::ZARR_ZIP_SUFFIX)
    }

    fn analysis_file(&self) -> String {
        format!("{}{}", self.analysis_name, names::ZARR_ZIP_SUFFIX)
    }
}

/// 几何容器中的数组. 所有数组的细胞维长度都是 `N`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryArrays {
    /// `(N, 2)`, 每行 `[id, 1]`.
    pub cell_id: Array2<u32>,

    /// `(N, 7)`, 见 [`crate::extract::Cell::summary_row`]. 只保留在内存中, 不写入容器.
    pub cell_summary: Array2<f64>,

    /// `(2, N)`, 第 0 行为细胞核, 第 1 行为细胞, 均为顶点数加一.
    pub polygon_num_vertices: Array2<i32>,

    /// `(2, N, M, 2)`, 先细胞核后细胞.
    pub polygon_vertices: Array4<f32>,

    /// `(N,)`, 等于稠密 id.
    pub seg_mask_value: Array1<i32>,
}

impl GeometryArrays {
    /// 由保留的细胞构建.
    pub fn from_cells(cells: &CellSet, max_vertices: usize) -> Self {
        let n = cells.len();
        let cells = cells.cells();

        let cell_id = Array2::from_shape_fn((n, 2), |(i, j)| match j {
            0 => cells[i].id(),
            _ => DATASET_PARTITION,
        });

        let mut cell_summary = Array2::<f64>::zeros((n, consts::CELL_SUMMARY_COLUMNS));
        for (mut row, cell) in cell_summary.outer_iter_mut().zip(cells) {
            row.assign(&Array1::from(cell.summary_row().to_vec()));
        }

        let nuclei: Vec<Vertices> = cells.iter().map(|c| c.nucleus().to_vec()).collect();
        let boundaries: Vec<Vertices> = cells.iter().map(|c| c.boundary().to_vec()).collect();

        let polygon_num_vertices = Array2::from_shape_fn((2, n), |(k, i)| {
            let len = match k {
                0 => nuclei[i].len(),
                _ => boundaries[i].len(),
            };
            len as i32 + VERTEX_COUNT_BIAS
        });

        let mut polygon_vertices = Array4::<f32>::zeros((2, n, max_vertices, 2));
        polygon_vertices
            .index_axis_mut(Axis(0), 0)
            .assign(&pack_vertices(&nuclei, max_vertices));
        polygon_vertices
            .index_axis_mut(Axis(0), 1)
            .assign(&pack_vertices(&boundaries, max_vertices));

        let seg_mask_value = cells.iter().map(|c| c.id() as i32).collect();

        Self {
            cell_id,
            cell_summary,
            polygon_num_vertices,
            polygon_vertices,
            seg_mask_value,
        }
    }

    /// 细胞个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.seg_mask_value.len()
    }

    /// 是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seg_mask_value.is_empty()
    }

    fn write_into(&self, w: &mut ZarrZipWriter) -> StoreResult<()> {
        w.write_array("cell_id", &self.cell_id)?;
        w.write_array("polygon_num_vertices", &self.polygon_num_vertices)?;
        w.write_array("polygon_vertices", &self.polygon_vertices)?;
        w.write_array("seg_mask_value", &self.seg_mask_value)
    }
}

/// 全部分组及其稀疏编码.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterGroups {
    groups: Vec<(Grouping, SparseGroups)>,
}

impl ClusterGroups {
    /// 对每个分组独立编码.
    pub fn encode(groupings: Vec<Grouping>) -> ConvertResult<Self> {
        let groups = groupings
            .into_iter()
            .map(|g| match encode_groups(g.labels()) {
                Ok(sparse) => Ok((g, sparse)),
                Err(source) => Err(ConvertError::Sparse {
                    grouping: g.name().to_owned(),
                    source,
                }),
            })
            .collect::<ConvertResult<_>>()?;
        Ok(Self { groups })
    }

    /// 分组个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// 是否没有分组.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// 按顺序迭代分组及其编码.
    pub fn iter(&self) -> impl Iterator<Item = (&Grouping, &SparseGroups)> {
        self.groups.iter().map(|(g, s)| (g, s))
    }

    /// 分组名.
    pub fn names(&self) -> Vec<String> {
        self.groups.iter().map(|(g, _)| g.name().to_owned()).collect()
    }

    /// `cell_groups` 组的属性.
    pub fn attrs(&self) -> Attrs {
        let group_names: Vec<Value> = self
            .groups
            .iter()
            .map(|(g, _)| g.group_names().into())
            .collect();

        let mut attrs = Attrs::new();
        attrs.insert("major_version".into(), version::MAJOR.into());
        attrs.insert("minor_version".into(), version::MINOR.into());
        attrs.insert("number_groupings".into(), self.groups.len().into());
        attrs.insert("grouping_names".into(), self.names().into());
        attrs.insert("group_names".into(), group_names.into());
        attrs
    }

    fn write_into(&self, w: &mut ZarrZipWriter) -> StoreResult<()> {
        let root = names::CELL_GROUPS;
        w.create_group(root)?;
        w.write_attrs(root, &self.attrs())?;
        for (i, (_, sparse)) in self.groups.iter().enumerate() {
            let group = format!("{root}/{i}");
            w.create_group(&group)?;
            w.write_array(&format!("{group}/indices"), sparse.indices())?;
            w.write_array(&format!("{group}/indptr"), sparse.indptr())?;
        }
        Ok(())
    }
}

/// 一次转换的汇总.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    /// 抽取统计.
    pub stats: ExtractStats,

    /// 保留的细胞数.
    pub kept: usize,

    /// 写出的分组名.
    pub groupings: Vec<String>,

    /// 几何容器路径.
    pub cells_path: PathBuf,

    /// 分组容器路径.
    pub analysis_path: PathBuf,

    /// 描述文件路径.
    pub experiment_path: PathBuf,
}

/// 源目录中的必需文件.
struct SourceFiles {
    cells: PathBuf,
    experiment: PathBuf,
}

impl SourceFiles {
    /// 检查源目录. 任一文件缺失都是致命的.
    fn locate(source_dir: &Path) -> ConvertResult<Self> {
        let cells = source_dir.join(names::SOURCE_CELLS);
        let experiment = source_dir.join(names::SOURCE_EXPERIMENT);
        for p in [&cells, &experiment] {
            if !p.is_file() {
                return Err(ConvertError::MissingSource(p.clone()));
            }
        }
        Ok(Self { cells, experiment })
    }
}

/// 数据集组装器.
#[derive(Debug, Clone)]
pub struct DatasetAssembler<B = Qhull> {
    spec: ConvertSpec,
    extractor: CellExtractor<B>,
}

impl DatasetAssembler<Qhull> {
    /// 使用 qhull 凸包初始化.
    #[inline]
    pub fn new(spec: ConvertSpec) -> Self {
        Self::with_builder(Qhull, spec)
    }
}

impl<B: BoundaryBuilder> DatasetAssembler<B> {
    /// 使用给定的边界算法初始化.
    pub fn with_builder(builder: B, spec: ConvertSpec) -> Self {
        let extractor =
            CellExtractor::with_builder(builder, spec.area).unassigned(spec.unassigned.clone());
        Self { spec, extractor }
    }

    /// 转换参数.
    #[inline]
    pub fn spec(&self) -> &ConvertSpec {
        &self.spec
    }

    /// 执行转换.
    ///
    /// `groupings` 为 `None` 时, 所有保留细胞归入唯一的分组 `default`, 标签为 `seg`.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        transcripts: &TranscriptTable,
        groupings: Option<&GroupingTable>,
        source_dir: P,
        output_dir: Q,
    ) -> ConvertResult<ConversionReport> {
        let source = SourceFiles::locate(source_dir.as_ref())?;
        self.run(&source, transcripts, groupings, output_dir.as_ref())
    }

    /// 从 parquet 文件读取输入表并执行转换.
    ///
    /// 分组表的关联列与转录本表的细胞分配列同名.
    #[cfg(feature = "parquet")]
    pub fn convert_files<P, Q, R, S>(
        &self,
        transcripts: P,
        groupings: Option<Q>,
        source_dir: R,
        output_dir: S,
    ) -> ConvertResult<ConversionReport>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
        R: AsRef<Path>,
        S: AsRef<Path>,
    {
        use crate::table::{read_grouping_table, read_transcript_table};

        let source = SourceFiles::locate(source_dir.as_ref())?;
        let columns = self.spec.columns();
        let transcripts = read_transcript_table(transcripts, columns)?;
        let groupings = match groupings {
            Some(p) => Some(read_grouping_table(p, &columns.cell_id)?),
            None => None,
        };
        self.run(&source, &transcripts, groupings.as_ref(), output_dir.as_ref())
    }

    /// 三个输出先全部暂存, 全部成功后才依次移动到目标路径.
    /// 中途失败时暂存文件随之删除, 输出目录中已有的旧文件保持不变.
    fn run(
        &self,
        source: &SourceFiles,
        transcripts: &TranscriptTable,
        groupings: Option<&GroupingTable>,
        output_dir: &Path,
    ) -> ConvertResult<ConversionReport> {
        fs::create_dir_all(output_dir)?;

        let cells = self.extractor.extract(transcripts);
        let geometry = GeometryArrays::from_cells(&cells, self.spec.max_vertices);

        let mut attrs = read_root_attrs(&source.cells)?;
        attrs.insert("number_cells".into(), geometry.len().into());

        let mut w = ZarrZipWriter::create(output_dir.join(self.spec.cells_file()))?;
        w.write_attrs("", &attrs)?;
        geometry.write_into(&mut w)?;
        let cells_file = w.stage()?;

        let joined = match groupings {
            Some(table) => join_groupings(&cells, table),
            None => {
                let table = GroupingTable::uniform(
                    cells.originals(),
                    names::DEFAULT_GROUPING,
                    names::DEFAULT_GROUP_LABEL,
                );
                join_groupings(&cells, &table)
            }
        };
        let groups = ClusterGroups::encode(joined)?;

        let mut w = ZarrZipWriter::create(output_dir.join(self.spec.analysis_file()))?;
        groups.write_into(&mut w)?;
        let analysis_file = w.stage()?;

        let experiment_file = generate_experiment_file(
            &source.experiment,
            output_dir.join(&self.spec.experiment_name),
            &self.spec.cells_name,
            &self.spec.analysis_name,
        )?;

        let cells_path = cells_file.commit()?;
        info!("Wrote {} cells to {}", geometry.len(), cells_path.display());
        let analysis_path = analysis_file.commit()?;
        info!(
            "Wrote {} groupings to {}",
            groups.len(),
            analysis_path.display()
        );
        let experiment_path = experiment_file.commit()?;
        info!("Wrote {}", experiment_path.display());

        Ok(ConversionReport {
            stats: *cells.stats(),
            kept: cells.len(),
            groupings: groups.names(),
            cells_path,
            analysis_path,
            experiment_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ZarrZipReader;
    use crate::table::{GroupingKeys, LabelColumn, LabelValue, TranscriptRow};
    use crate::Point2d;
    use serde_json::json;

    /// 正方形四角加中心, 共 5 个点.
    fn square(id: &str, (cx, cy): Point2d, side: f64, nucleus: bool) -> Vec<TranscriptRow> {
        let h = side / 2.0;
        [
            (cx - h, cy - h),
            (cx + h, cy - h),
            (cx + h, cy + h),
            (cx - h, cy + h),
            (cx, cy),
        ]
        .into_iter()
        .map(|p| TranscriptRow::new(id, p, 7.0, nucleus))
        .collect()
    }

    fn transcripts() -> TranscriptTable {
        let mut rows = Vec::new();
        rows.extend(square("bb-1", (0.0, 0.0), 5.0, true));
        rows.extend(square("tiny-1", (50.0, 0.0), 1.0, false));
        rows.extend(square("aa-1", (100.0, 0.0), 6.0, false));
        rows.push(TranscriptRow::new("few-1", (1.0, 1.0), 0.0, false));
        TranscriptTable::from_rows(rows)
    }

    fn source_dir(dir: &Path) -> PathBuf {
        let source = dir.join("source");
        fs::create_dir_all(&source).unwrap();

        let mut attrs = Attrs::new();
        attrs.insert("major_version".into(), 5.into());
        attrs.insert("minor_version".into(), 0.into());
        attrs.insert("number_cells".into(), 999.into());
        let mut w = ZarrZipWriter::create(source.join(names::SOURCE_CELLS)).unwrap();
        w.write_attrs("", &attrs).unwrap();
        w.finish().unwrap();

        let experiment = json!({
            "images": { "morphology_filepath": "m.ome.tif" },
            "xenium_explorer_files": {
                "cells_zarr_filepath": "cells.zarr.zip",
                "analysis_zarr_filepath": "analysis.zarr.zip"
            }
        });
        fs::write(source.join(names::SOURCE_EXPERIMENT), experiment.to_string()).unwrap();
        source
    }

    #[test]
    fn test_geometry_arrays() {
        let cells = CellExtractor::new(AreaRange::default()).extract(&transcripts());
        let g = GeometryArrays::from_cells(&cells, 4);

        assert_eq!(g.len(), 2);
        assert_eq!(g.cell_id, ndarray::array![[1, 1], [2, 1]]);
        assert_eq!(g.seg_mask_value.to_vec(), vec![1, 2]);
        assert_eq!(g.cell_summary.shape(), &[2, 7]);
        assert_eq!(g.cell_summary[[0, 2]], 25.0);
        assert_eq!(g.cell_summary[[1, 6]], 6.0);

        // 细胞核 4 个顶点; 细胞为闭合环, 5 个顶点.
        assert_eq!(g.polygon_num_vertices, ndarray::array![[5, 1], [6, 6]]);
        assert_eq!(g.polygon_vertices.shape(), &[2, 2, 4, 2]);
        // 第二个细胞没有细胞核, 整行为零.
        let nuclei = g.polygon_vertices.index_axis(Axis(0), 0);
        assert!(nuclei.index_axis(Axis(0), 1).iter().all(|&v| v == 0.0));
        assert!(g.polygon_vertices[[1, 1, 0, 0]] != 0.0);
    }

    #[test]
    fn test_convert_end_to_end() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
        let dir = tempfile::tempdir().unwrap();
        let source = source_dir(dir.path());
        let out = dir.path().join("out");

        let report = DatasetAssembler::new(ConvertSpec::default())
            .convert(&transcripts(), None, &source, &out)
            .unwrap();
        assert_eq!(report.kept, 2);
        assert_eq!(report.stats.groups, 4);
        assert_eq!(report.stats.rejected(), 2);
        assert_eq!(report.groupings, vec!["default"]);
        assert_eq!(report.cells_path, out.join("seg_cells.zarr.zip"));

        let mut r = ZarrZipReader::open(&report.cells_path).unwrap();
        let attrs = r.attrs("").unwrap();
        assert_eq!(attrs["number_cells"], 2);
        assert_eq!(attrs["major_version"], 5);
        let vertices = r.read_array::<f32>("polygon_vertices").unwrap();
        assert_eq!(vertices.shape(), &[2, 2, 128, 2]);
        for name in ["cell_id", "polygon_num_vertices"] {
            assert!(r.names().contains(&format!("{name}/.zarray")));
        }
        assert!(!r.names().iter().any(|n| n.starts_with("cell_summary")));
        assert_eq!(r.read_array::<i32>("seg_mask_value").unwrap().len(), 2);

        let mut r = ZarrZipReader::open(&report.analysis_path).unwrap();
        let attrs = r.attrs("cell_groups").unwrap();
        assert_eq!(attrs["number_groupings"], 1);
        assert_eq!(attrs["grouping_names"], json!(["default"]));
        assert_eq!(attrs["group_names"], json!([["seg"]]));
        assert_eq!(attrs["major_version"], 1);
        let indices = r.read_array::<u32>("cell_groups/0/indices").unwrap();
        assert_eq!(indices.iter().copied().collect::<Vec<_>>(), vec![0, 1]);
        let indptr = r.read_array::<u32>("cell_groups/0/indptr").unwrap();
        assert_eq!(indptr.iter().copied().collect::<Vec<_>>(), vec![0]);

        let text = fs::read_to_string(&report.experiment_path).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["images"], json!({}));
        assert_eq!(
            doc["xenium_explorer_files"]["cells_zarr_filepath"],
            "seg_cells.zarr.zip"
        );
    }

    #[test]
    fn test_convert_with_groupings() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_dir(dir.path());
        let out = dir.path().join("out");

        let table = GroupingTable::new(
            GroupingKeys::Text(vec![Some("aa-1".into()), Some("zz-1".into())]),
            vec![
                LabelColumn::new("celltype", vec![Some("T".into()), Some("B".into())]),
                LabelColumn::new("leiden", vec![Some(LabelValue::Int(3)), None]),
            ],
        )
        .unwrap();
        let spec = ConvertSpec::default()
            .with_cells_name("c")
            .with_analysis_name("a");
        let report = DatasetAssembler::new(spec)
            .convert(&transcripts(), Some(&table), &source, &out)
            .unwrap();
        assert_eq!(report.groupings, vec!["celltype", "leiden"]);
        assert_eq!(report.analysis_path, out.join("a.zarr.zip"));

        let mut r = ZarrZipReader::open(&report.analysis_path).unwrap();
        let attrs = r.attrs("cell_groups").unwrap();
        assert_eq!(attrs["group_names"], json!([["T"], ["3"]]));
        // "bb-1" 在第 0 行且无匹配, "aa-1" 在第 1 行.
        let indices = r.read_array::<u32>("cell_groups/1/indices").unwrap();
        assert_eq!(indices.iter().copied().collect::<Vec<_>>(), vec![1, 0]);
    }

    #[test]
    fn test_failed_run_keeps_previous_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_dir(dir.path());
        let out = dir.path().join("out");
        let assembler = DatasetAssembler::new(ConvertSpec::default());
        let first = assembler.convert(&transcripts(), None, &source, &out).unwrap();
        let before = fs::read(&first.cells_path).unwrap();

        // 描述模板损坏: 两个容器已暂存, 但都不应被提交.
        fs::write(source.join(names::SOURCE_EXPERIMENT), "not json").unwrap();
        let table = TranscriptTable::from_rows(square("cc-1", (0.0, 0.0), 4.0, false));
        let err = assembler.convert(&table, None, &source, &out).unwrap_err();
        assert!(matches!(err, ConvertError::Descriptor(_)));

        assert_eq!(fs::read(&first.cells_path).unwrap(), before);
        let mut names: Vec<String> = fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "seg_analysis.zarr.zip",
                "seg_cells.zarr.zip",
                "seg_experiment.xenium"
            ]
        );
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = DatasetAssembler::new(ConvertSpec::default())
            .convert(&transcripts(), None, dir.path(), &out)
            .unwrap_err();
        assert!(matches!(err, ConvertError::MissingSource(p) if p.ends_with("cells.zarr.zip")));
        assert!(!out.exists());
    }

    #[test]
    fn test_convert_spec_builder() {
        let spec = ConvertSpec::default()
            .with_area(AreaRange::new(0.0, 1.0).unwrap())
            .with_max_vertices(64)
            .with_unassigned("-1");
        assert_eq!(spec.max_vertices(), 64);
        assert_eq!(spec.area().high(), 1.0);
        assert_eq!(spec.cells_file(), "seg_cells.zarr.zip");
        assert_eq!(spec.columns().cell_id, "seg_cell_id");
    }
}
