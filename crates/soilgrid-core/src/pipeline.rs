//! Pipeline orchestrator: runs all classification stages in order.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use crate::aggregate::aggregate;
use crate::classify::{classify, Classification};
use crate::config::PyramidConfig;
use crate::error::Result;
use crate::link::link;
use crate::loader::{load_csv, CellRecord};
use crate::policy::{AttributeDistancePolicy, CandidatePolicy};
use crate::prune::{prune, verify_parent_links};
use crate::pyramid::Pyramid;

// ── Public structs ────────────────────────────────────────────────────────────

/// Stage-by-stage counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineReport {
    pub base_rows: usize,
    pub base_cols: usize,
    pub levels: usize,
    pub loaded_cells: usize,
    /// Base cells without a record.
    pub unpopulated_cells: usize,
    /// Homogeneous nodes per level after aggregation, base first.
    pub homogeneous_per_level: Vec<usize>,
    pub reset_cells: usize,
    pub repaired_links: usize,
    pub link_sweeps: usize,
    pub links: usize,
    pub regions: usize,
    pub fused_orphans: usize,
    pub elapsed_ms: u64,
}

/// Full output of one pipeline run.
pub struct PipelineResult {
    pub pyramid: Pyramid,
    pub classification: Classification,
    pub report: PipelineReport,
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct PyramidPipeline<P = AttributeDistancePolicy> {
    config: PyramidConfig,
    policy: P,
}

impl PyramidPipeline<AttributeDistancePolicy> {
    /// Pipeline with the attribute-distance policy described by `config.policy`.
    pub fn new(config: PyramidConfig) -> Result<Self> {
        let policy = AttributeDistancePolicy::new(config.policy);
        Self::with_policy(config, policy)
    }
}

impl<P: CandidatePolicy> PyramidPipeline<P> {
    pub fn with_policy(config: PyramidConfig, policy: P) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    pub fn config(&self) -> &PyramidConfig {
        &self.config
    }

    /// Load `path` and run every stage.
    pub fn run_csv(&self, path: impl AsRef<Path>) -> Result<PipelineResult> {
        let records = load_csv(path)?;
        self.run(records)
    }

    /// Run the full pipeline over already-loaded records.
    ///
    /// Stage order:
    ///   1. Allocate the pyramid
    ///   2. Populate the base level
    ///   3. Aggregate levels bottom-up
    ///   4. Prune and check parent links
    ///   5. Link orphans to a fixed point
    ///   6. Classify top-down
    ///
    /// Any error aborts the run; no partial pyramid is returned.
    pub fn run<I>(&self, records: I) -> Result<PipelineResult>
    where
        I: IntoIterator<Item = CellRecord>,
    {
        let started = Instant::now();
        let cfg = &self.config;

        // ── 1. Allocation ───────────────────────────────────────────────────
        let mut pyramid = Pyramid::new(cfg.base_rows, cfg.base_cols)?;
        log::info!(
            "pyramid allocated: {}×{} base, {} levels",
            cfg.base_rows,
            cfg.base_cols,
            pyramid.level_count()
        );

        // ── 2. Base population ──────────────────────────────────────────────
        let load = pyramid.load(records)?;
        log::info!("loaded {} base cells", load.loaded);

        // ── 3. Aggregation ──────────────────────────────────────────────────
        let homogeneous_per_level = aggregate(&mut pyramid, cfg.attribute_match);
        log::info!("aggregation done: homogeneous per level {homogeneous_per_level:?}");

        // ── 4. Pruning ──────────────────────────────────────────────────────
        let pruned = prune(&mut pyramid);
        verify_parent_links(&pyramid)?;

        // ── 5. Linking ──────────────────────────────────────────────────────
        let linked = link(&mut pyramid, &self.policy)?;

        // ── 6. Classification ───────────────────────────────────────────────
        let classification = classify(&mut pyramid, &self.policy)?;

        let report = PipelineReport {
            base_rows: cfg.base_rows,
            base_cols: cfg.base_cols,
            levels: pyramid.level_count(),
            loaded_cells: load.loaded,
            unpopulated_cells: load.unpopulated,
            homogeneous_per_level,
            reset_cells: pruned.reset,
            repaired_links: pruned.repaired,
            link_sweeps: linked.sweeps,
            links: linked.links,
            regions: classification.len(),
            fused_orphans: classification.fused,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        log::info!("pipeline finished in {} ms", report.elapsed_ms);

        Ok(PipelineResult {
            pyramid,
            classification,
            report,
        })
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::ClassId;
    use crate::error::PyramidError;
    use crate::pyramid::tests::records;

    #[test]
    fn uniform_grid_end_to_end() {
        let pipeline = PyramidPipeline::new(PyramidConfig::new(16, 16)).unwrap();
        let result = pipeline.run(records(16, 16, |_, _| 0.4)).unwrap();

        let r = &result.report;
        assert_eq!(r.levels, 5);
        assert_eq!(r.loaded_cells, 256);
        assert_eq!(r.homogeneous_per_level, vec![256, 64, 16, 4, 1]);
        assert_eq!(r.reset_cells, 0);
        assert_eq!(r.regions, 1);

        let apex = result.pyramid.level(4).get(0, 0);
        assert_eq!(apex.area, Some(256));
        assert_eq!(result.pyramid.orphan_count(), 1);
        assert!(result.pyramid.base_classes().iter().all(|&c| c == Some(ClassId(0))));
    }

    #[test]
    fn quadrant_scenario_end_to_end() {
        let pipeline = PyramidPipeline::new(PyramidConfig::new(4, 4)).unwrap();
        let value = |r: usize, c: usize| {
            if r < 2 && c < 2 {
                0.5
            } else {
                10.0 + (r * 4 + c) as f64
            }
        };
        let result = pipeline.run(records(4, 4, value)).unwrap();

        let r = &result.report;
        assert_eq!(r.homogeneous_per_level, vec![16, 1, 0]);
        assert_eq!(r.reset_cells, 4);
        assert_eq!(r.regions, 13);
        assert_eq!(result.pyramid.level(1).valid_count(), 1);
    }

    #[test]
    fn id_outside_grid_aborts_the_run() {
        let pipeline = PyramidPipeline::new(PyramidConfig::new(2, 2)).unwrap();
        let mut recs = records(2, 2, |_, _| 1.0);
        recs[3].id = 4;
        assert!(matches!(
            pipeline.run(recs),
            Err(PyramidError::IdOutOfRange { id: 4, cells: 4 })
        ));
    }

    #[test]
    fn csv_file_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.csv");
        let mut csv = String::from("id,cc,est,pend,por,pmp,uh,ui,us\n");
        for id in 0..16 {
            let cc = if id == 15 { 0.9 } else { 0.3 };
            csv.push_str(&format!("{id},{cc},1,2,0.4,0.1,0.3,0.2,0.1\n"));
        }
        std::fs::write(&path, csv).unwrap();

        let pipeline = PyramidPipeline::new(PyramidConfig::new(4, 4)).unwrap();
        let result = pipeline.run_csv(&path).unwrap();
        let r = &result.report;
        assert_eq!(r.loaded_cells, 16);
        assert_eq!(r.unpopulated_cells, 0);
        assert_eq!(r.homogeneous_per_level, vec![16, 3, 0]);
        // Three uniform quadrants plus the four cells of the split one.
        assert_eq!(r.regions, 7);
    }

    #[test]
    fn missing_csv_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = PyramidPipeline::new(PyramidConfig::new(2, 2)).unwrap();
        assert!(matches!(
            pipeline.run_csv(dir.path().join("absent.csv")),
            Err(PyramidError::Io(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        assert!(PyramidPipeline::new(PyramidConfig::new(0, 3)).is_err());
    }

    #[test]
    fn report_serialises_to_json() {
        let pipeline = PyramidPipeline::new(PyramidConfig::new(2, 2)).unwrap();
        let result = pipeline.run(records(2, 2, |_, _| 1.0)).unwrap();
        let json = serde_json::to_value(&result.report).unwrap();
        assert_eq!(json["regions"], 1);
        assert_eq!(json["homogeneous_per_level"], serde_json::json!([4, 1]));
    }
}
