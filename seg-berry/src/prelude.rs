//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{ConvertError, ConvertResult, Point2d, Vertices};

pub use crate::assemble::{
    ClusterGroups, ConversionReport, ConvertSpec, DatasetAssembler, GeometryArrays,
};
pub use crate::codec::{decode, encode, CellId, DecodeError};
pub use crate::extract::{AreaRange, Cell, CellExtractor, CellSet, ExtractStats};
pub use crate::geometry::{Boundary, BoundaryBuilder, BoundaryError, Qhull};
pub use crate::grouping::{join_groupings, Grouping};
pub use crate::pack::{pack_flat_vertices, pack_vertices};
pub use crate::sparse::{encode_groups, SparseEncodeError, SparseGroups};
pub use crate::table::{
    ColumnNames, GroupingKeys, GroupingTable, LabelColumn, LabelValue, TableError, TranscriptRow,
    TranscriptTable,
};

#[cfg(feature = "parquet")]
pub use crate::table::{read_grouping_table, read_transcript_table};

pub use crate::consts::MAX_VERTICES;
