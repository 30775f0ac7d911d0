//! 转换结果.

use seg_berry::prelude::ConversionReport;
use std::io::{self, Write};

/// 将 `report` 写进 `w` 中.
fn describe_into<W: Write>(r: &ConversionReport, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let s = &r.stats;
    writeln!(w, "Conversion report:")?;
    writeln!(w, "{S4}Cells seen: {}", s.groups)?;
    writeln!(w, "{S4}Cells kept: {}", r.kept)?;
    writeln!(w, "{S4}Cells with nucleus: {}", s.with_nucleus)?;
    writeln!(w, "{S4}Too few transcripts: {}", s.too_few_transcripts)?;
    writeln!(w, "{S4}Degenerate boundary: {}", s.degenerate)?;
    writeln!(w, "{S4}Area out of range: {}", s.area_out_of_range)?;
    writeln!(w, "{S4}Unassigned transcripts: {}", s.unassigned_rows)?;
    writeln!(w, "{S4}Groupings: {}", r.groupings.join(", "))?;
    writeln!(w, "{S4}Cells container: {}", r.cells_path.display())?;
    writeln!(w, "{S4}Analysis container: {}", r.analysis_path.display())?;
    write!(w, "{S4}Experiment file: {}", r.experiment_path.display())?;
    Ok(())
}

/// 打印转换结果.
pub fn print_report(report: &ConversionReport) -> io::Result<()> {
    let mut out = io::stdout().lock();
    utils::sep_to(&mut out)?;
    describe_into(report, &mut out)?;
    writeln!(out)?;
    utils::sep_to(&mut out)
}
