//! parquet 文件读取.

use super::{
    ColumnNames, GroupingKeys, GroupingTable, LabelColumn, LabelValue, TableError,
    TranscriptTable,
};
use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, SchemaRef, UInt32Type};
use arrow::record_batch::RecordBatch;
use log::info;
use ordered_float::OrderedFloat;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;

/// 读取整个 parquet 文件.
fn read_batches(path: &Path) -> Result<(SchemaRef, Vec<RecordBatch>), TableError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let batches = builder.build()?.collect::<Result<Vec<_>, _>>()?;
    Ok((schema, batches))
}

fn require(schema: &SchemaRef, name: &str) -> Result<DataType, TableError> {
    schema
        .field_with_name(name)
        .map(|f| f.data_type().clone())
        .map_err(|_| TableError::MissingColumn(name.to_owned()))
}

/// 获取批次中的列. schema 已检查过, 缺失只可能来自损坏的文件.
fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array, TableError> {
    batch
        .column_by_name(name)
        .map(|c| c.as_ref())
        .ok_or_else(|| TableError::MissingColumn(name.to_owned()))
}

/// 空值读作 NaN.
fn f64_column(batches: &[RecordBatch], name: &str) -> Result<Vec<f64>, TableError> {
    let mut out = Vec::new();
    for batch in batches {
        let col = cast(column(batch, name)?, &DataType::Float64)?;
        let col = col.as_primitive::<Float64Type>();
        out.extend(col.iter().map(|v| v.unwrap_or(f64::NAN)));
    }
    Ok(out)
}

fn string_column(batches: &[RecordBatch], name: &str) -> Result<Vec<Option<String>>, TableError> {
    let mut out = Vec::new();
    for batch in batches {
        let col = cast(column(batch, name)?, &DataType::Utf8)?;
        let col = col.as_string::<i32>();
        out.extend(col.iter().map(|v| v.map(str::to_owned)));
    }
    Ok(out)
}

/// 超出 `u32` 范围的值读作空.
fn u32_column(batches: &[RecordBatch], name: &str) -> Result<Vec<Option<u32>>, TableError> {
    let mut out = Vec::new();
    for batch in batches {
        let col = cast(column(batch, name)?, &DataType::UInt32)?;
        out.extend(col.as_primitive::<UInt32Type>().iter());
    }
    Ok(out)
}

/// 按列类型读取标签: 整数列 -> `Int`, 浮点列 -> `Float` (NaN 视为空), 其余 -> `Text`.
fn label_column(
    batches: &[RecordBatch],
    name: &str,
    data_type: &DataType,
) -> Result<Vec<Option<LabelValue>>, TableError> {
    let mut out = Vec::new();
    for batch in batches {
        let col = column(batch, name)?;
        if data_type.is_integer() {
            let col = cast(col, &DataType::Int64)?;
            out.extend(col.as_primitive::<Int64Type>().iter().map(|v| v.map(LabelValue::Int)));
        } else if data_type.is_floating() {
            let col = cast(col, &DataType::Float64)?;
            out.extend(col.as_primitive::<Float64Type>().iter().map(|v| {
                v.filter(|f| !f.is_nan())
                    .map(|f| LabelValue::Float(OrderedFloat(f)))
            }));
        } else {
            let col = cast(col, &DataType::Utf8).map_err(|_| TableError::UnsupportedType {
                column: name.to_owned(),
                data_type: data_type.to_string(),
            })?;
            out.extend(
                col.as_string::<i32>()
                    .iter()
                    .map(|v| v.map(|s| LabelValue::Text(s.to_owned()))),
            );
        }
    }
    Ok(out)
}

/// 读取转录本表.
///
/// 细胞分配列可以是字符串或整数; 坐标列转换为 `f64`; 细胞核标记列可以是布尔或数值,
/// 等于 `1` 代表重叠. z 坐标列可以缺失.
pub fn read_transcript_table<P: AsRef<Path>>(
    path: P,
    names: &ColumnNames,
) -> Result<TranscriptTable, TableError> {
    let path = path.as_ref();
    let (schema, batches) = read_batches(path)?;

    for name in [&names.cell_id, &names.x, &names.y, &names.nucleus] {
        require(&schema, name)?;
    }
    let has_z = schema.field_with_name(&names.z).is_ok();

    let cell_ids = string_column(&batches, &names.cell_id)?;
    let x = f64_column(&batches, &names.x)?;
    let y = f64_column(&batches, &names.y)?;
    let z = if has_z {
        Some(f64_column(&batches, &names.z)?)
    } else {
        None
    };
    let nucleus = f64_column(&batches, &names.nucleus)?
        .into_iter()
        .map(|v| v == 1.0)
        .collect();

    let table = TranscriptTable::new(cell_ids, x, y, z, nucleus)?;
    info!("Loaded {} transcripts from {}", table.len(), path.display());
    Ok(table)
}

/// 读取分组表. `key` 为关联列, 其余所有列都视为分组.
///
/// 关联列为整数类型时视为 Explorer 数值标识符, 否则视为文本标识符.
pub fn read_grouping_table<P: AsRef<Path>>(path: P, key: &str) -> Result<GroupingTable, TableError> {
    let path = path.as_ref();
    let (schema, batches) = read_batches(path)?;

    let keys = if require(&schema, key)?.is_integer() {
        GroupingKeys::Numeric(u32_column(&batches, key)?)
    } else {
        GroupingKeys::Text(string_column(&batches, key)?)
    };

    let mut columns = Vec::new();
    for field in schema.fields().iter().filter(|f| f.name() != key) {
        let values = label_column(&batches, field.name(), field.data_type())?;
        columns.push(LabelColumn::new(field.name().as_str(), values));
    }

    let table = GroupingTable::new(keys, columns)?;
    info!(
        "Loaded {} groupings over {} rows from {}",
        table.columns().len(),
        table.keys().len(),
        path.display()
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{BooleanArray, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Field, Schema};
    use parquet::arrow::ArrowWriter;
    use std::sync::Arc;

    fn write_parquet(path: &Path, batch: RecordBatch) {
        let file = File::create(path).unwrap();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();
    }

    #[test]
    fn test_read_transcripts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("seg_cell_id", DataType::Utf8, true),
            Field::new("x_location", DataType::Float64, false),
            Field::new("y_location", DataType::Float64, false),
            Field::new("overlaps_nucleus", DataType::Boolean, false),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("abc-1"), None])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
                Arc::new(Float64Array::from(vec![3.0, 4.0])),
                Arc::new(BooleanArray::from(vec![true, false])),
            ],
        )
        .unwrap();
        write_parquet(&path, batch);

        let t = read_transcript_table(&path, &ColumnNames::default()).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.cell_id(0), Some("abc-1"));
        assert_eq!(t.cell_id(1), None);
        assert_eq!(t.point(1), (2.0, 4.0));
        assert_eq!(t.z(0), 0.0);
        assert!(t.overlaps_nucleus(0));
        assert!(!t.overlaps_nucleus(1));

        let mut names = ColumnNames::default();
        names.x = "nope".to_owned();
        assert!(matches!(
            read_transcript_table(&path, &names),
            Err(TableError::MissingColumn(c)) if c == "nope"
        ));
    }

    #[test]
    fn test_read_grouping_numeric_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("g.parquet");
        let schema = Arc::new(Schema::new(vec![
            Field::new("seg_cell_id", DataType::Int64, false),
            Field::new("leiden", DataType::Int64, true),
            Field::new("celltype", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vec![18, 564])),
                Arc::new(Int64Array::from(vec![Some(10), None])),
                Arc::new(StringArray::from(vec![Some("B"), Some("T")])),
            ],
        )
        .unwrap();
        write_parquet(&path, batch);

        let g = read_grouping_table(&path, "seg_cell_id").unwrap();
        assert_eq!(g.keys(), &GroupingKeys::Numeric(vec![Some(18), Some(564)]));
        assert_eq!(g.columns().len(), 2);
        assert_eq!(g.columns()[0].name(), "leiden");
        assert_eq!(
            g.columns()[0].values(),
            &[Some(LabelValue::Int(10)), None]
        );
        assert_eq!(g.columns()[1].values()[1], Some(LabelValue::from("T")));
    }
}
