#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 将空间转录组分割流程输出的 "转录本 -> 细胞" 分配结果,
//! 转换为 Xenium Explorer 可直接加载的定长数组数据集.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 分割本身不在本 crate 的职责内. 输入必须已经包含每个转录本所属的细胞.
//! 2. 不渲染任何图像, 也不处理 Explorer 的形态学图像金字塔.
//!   描述文件中对这些图像的引用会被直接删除.
//! 3. 单个细胞层面的失败 (凸包退化、标识符无法解码等) 只会跳过该细胞并记录警告,
//!   不会终止整个转换.
//!
//! # 开发计划
//!
//! ### 细胞标识符编解码 ✅
//!
//! `PREFIX-SUFFIX` 形式的文本标识符与 Explorer 数值标识符之间的转换.
//!
//! 实现位于 `seg-berry/src/codec.rs`.
//!
//! ### 凸包边界与面积过滤 ✅
//!
//! 按细胞分组转录本, 计算凸包, 并按转录本数量和面积区间过滤.
//!
//! 实现位于 `seg-berry/src/geometry` 和 `seg-berry/src/extract.rs`.
//!
//! ### 定长顶点数组 ✅
//!
//! 截断或补零, 输出 `(N, 128, 2)` 的 `f32` 数组.
//!
//! 实现位于 `seg-berry/src/pack.rs`.
//!
//! ### 分组稀疏编码 ✅
//!
//! 类 CSR 的 `indices` / `indptr` 编码.
//!
//! 实现位于 `seg-berry/src/sparse.rs` 和 `seg-berry/src/grouping.rs`.
//!
//! ### zarr 容器与实验描述文件 ✅
//!
//! zip 包装的 zarr v2 层级结构, 以及从模板派生的 `.xenium` 描述文件.
//!
//! 实现位于 `seg-berry/src/store` 和 `seg-berry/src/descriptor.rs`.
//!
//! ### 转换流程 ✅
//!
//! 实现位于 `seg-berry/src/assemble.rs`.

/// 二维平面点 `(x, y)`.
pub type Point2d = (f64, f64);

/// 一个多边形的顶点序列.
pub type Vertices = Vec<Point2d>;

pub mod consts;

pub mod codec;

pub mod geometry;

pub mod extract;

pub mod pack;

pub mod sparse;

pub mod grouping;

pub mod table;

pub mod store;

pub mod descriptor;

pub mod assemble;

mod error;

pub use error::{ConvertError, ConvertResult};

pub mod prelude;
