//! `seg2explorer`: 将分割结果转换为 Xenium Explorer 数据集.

mod result;
mod runner;

use clap::Parser;
use std::path::PathBuf;

/// 命令行参数.
#[derive(Debug, Parser)]
#[command(version, about = "Convert segmentation output into a Xenium Explorer dataset")]
pub struct Args {
    /// 转录本分配表 (parquet).
    pub transcripts: PathBuf,

    /// 分组表 (parquet). 缺省时所有细胞归入同一个分组.
    #[arg(short, long)]
    pub groupings: Option<PathBuf>,

    /// 源目录, 需含有 `cells.zarr.zip` 与 `experiment.xenium`.
    /// 缺省时使用 `$SEG2EXPLORER_SOURCE_DIR` 或 `$HOME/dataset/xenium`.
    #[arg(short, long)]
    pub source_dir: Option<PathBuf>,

    /// 输出目录.
    #[arg(short, long, env = "SEG2EXPLORER_OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// 细胞分配列, 同时也是分组表的关联列.
    #[arg(long, default_value = "seg_cell_id")]
    pub cell_id_column: String,

    /// x 坐标列.
    #[arg(long, default_value = "x_location")]
    pub x_column: String,

    /// y 坐标列.
    #[arg(long, default_value = "y_location")]
    pub y_column: String,

    /// z 坐标列.
    #[arg(long, default_value = "z_location")]
    pub z_column: String,

    /// 细胞核重叠标记列.
    #[arg(long, default_value = "overlaps_nucleus")]
    pub nucleus_column: String,

    /// "未分配" 哨兵值.
    #[arg(long, default_value = "UNASSIGNED")]
    pub unassigned: String,

    /// 面积下限.
    #[arg(long, default_value_t = 10.0)]
    pub area_low: f64,

    /// 面积上限.
    #[arg(long, default_value_t = 100.0)]
    pub area_high: f64,

    /// 几何容器名.
    #[arg(long, default_value = "seg_cells")]
    pub cells_name: String,

    /// 分组容器名.
    #[arg(long, default_value = "seg_analysis")]
    pub analysis_name: String,

    /// 输出描述文件名.
    #[arg(long, default_value = "seg_experiment.xenium")]
    pub experiment_name: String,

    /// 输出调试日志.
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    utils::init_logger(args.verbose);

    let report = runner::run(&args)?;
    result::print_report(&report)?;
    Ok(())
}
