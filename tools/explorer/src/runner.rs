//! 程序运行函数.

use crate::Args;
use anyhow::{anyhow, Context};
use log::info;
use seg_berry::prelude::*;
use utils::loader;

/// 由命令行参数构建转换参数.
fn convert_spec(args: &Args) -> anyhow::Result<ConvertSpec> {
    let area = AreaRange::new(args.area_low, args.area_high).ok_or_else(|| {
        anyhow!(
            "invalid area range [{}, {}]",
            args.area_low,
            args.area_high
        )
    })?;
    let columns = ColumnNames {
        cell_id: args.cell_id_column.clone(),
        x: args.x_column.clone(),
        y: args.y_column.clone(),
        z: args.z_column.clone(),
        nucleus: args.nucleus_column.clone(),
    };
    Ok(ConvertSpec::default()
        .with_columns(columns)
        .with_unassigned(args.unassigned.as_str())
        .with_area(area)
        .with_cells_name(args.cells_name.as_str())
        .with_analysis_name(args.analysis_name.as_str())
        .with_experiment_name(args.experiment_name.as_str()))
}

/// 实际运行.
pub fn run(args: &Args) -> anyhow::Result<ConversionReport> {
    let spec = convert_spec(args)?;
    let source_dir = match &args.source_dir {
        Some(d) => d.clone(),
        None => loader::source_dir_from_env_or_home()
            .context("cannot determine the source directory")?,
    };
    info!("Source directory: {}", source_dir.display());

    DatasetAssembler::new(spec)
        .convert_files(
            &args.transcripts,
            args.groupings.as_ref(),
            &source_dir,
            &args.output_dir,
        )
        .with_context(|| format!("converting {}", args.transcripts.display()))
}
