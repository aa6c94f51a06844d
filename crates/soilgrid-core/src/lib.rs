//! Quadtree pyramid over a soil/climate grid: aggregation, pruning, linking
//! and classification of cells into homogeneous regions.
pub mod aggregate;
pub mod attributes;
pub mod cell;
pub mod classify;
pub mod config;
pub mod error;
pub mod grid;
pub mod link;
pub mod loader;
mod par;
pub mod pipeline;
pub mod policy;
pub mod prune;
pub mod pyramid;

pub use aggregate::AttributeMatch;
pub use attributes::SoilAttributes;
pub use cell::{Cell, CellIndex, ClassId, Homogeneity};
pub use classify::{Classification, Region};
pub use config::PyramidConfig;
pub use error::{PyramidError, Result};
pub use pipeline::{PipelineReport, PipelineResult, PyramidPipeline};
pub use policy::{AttributeDistancePolicy, CandidatePolicy, PolicyConfig};
pub use pyramid::Pyramid;
