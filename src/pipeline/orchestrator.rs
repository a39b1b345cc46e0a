use crate::config::RunConfig;
use crate::core::reproject::ReprojectionEngine;
use crate::io::RasterStore;
use crate::pipeline::ledger::{ArtifactLedger, BundleId};
use crate::pipeline::stages::{ArtifactExporter, StageContext, StageOperation, StageSet};
use crate::types::{Artifact, ArtifactKind, PlaiceResult, Stage};
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One raw capture to process: a directory, a single file, or several tile
/// files merged into one product. Immutable once enumerated.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub inputs: Vec<PathBuf>,
}

impl Bundle {
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            inputs: vec![path.into()],
        }
    }

    /// The bundle's inputs wrapped as raw artifacts for the first stage.
    fn raw_artifacts(&self) -> Vec<Artifact> {
        self.inputs
            .iter()
            .map(|p| Artifact::new(p.clone(), ArtifactKind::Raw))
            .collect()
    }
}

/// Provenance log written alongside the products, one file per Run.
struct RunLog {
    path: PathBuf,
    file: std::io::BufWriter<fs::File>,
}

impl RunLog {
    fn create(path: PathBuf) -> PlaiceResult<Self> {
        let file = std::io::BufWriter::new(fs::File::create(&path)?);
        Ok(Self { path, file })
    }

    fn note(&mut self, message: &str) {
        log::debug!("{}", message);
        // Provenance must not abort processing
        let _ = writeln!(self.file, "{}", message);
    }

    fn finish(mut self) -> PathBuf {
        let _ = self.file.flush();
        self.path
    }
}

/// Drives bundles through the stage sequence, keeps the artifact ledger
/// current, and applies the optional reprojection, export and cleanup
/// passes.
///
/// Bundles are processed strictly sequentially; a failure in one bundle's
/// chain never aborts the Run, only that bundle's remaining stages.
pub struct PipelineOrchestrator<'a> {
    config: RunConfig,
    stages: StageSet,
    store: &'a dyn RasterStore,
    exporter: Option<Box<dyn ArtifactExporter>>,
    ledger: ArtifactLedger,
    run_id: String,
    output_dir: PathBuf,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        config: RunConfig,
        stages: StageSet,
        store: &'a dyn RasterStore,
    ) -> PlaiceResult<Self> {
        config.validate()?;
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| Utc::now().format("%Y%m%d_%H%M%S").to_string());
        let output_dir = config.output.clone().unwrap_or_else(|| PathBuf::from("."));
        Ok(Self {
            config,
            stages,
            store,
            exporter: None,
            ledger: ArtifactLedger::new(),
            run_id,
            output_dir,
        })
    }

    pub fn with_exporter(mut self, exporter: Box<dyn ArtifactExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("plaice_run_{}_settings.json", self.run_id))
    }

    fn log_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("plaice_run_{}_log.txt", self.run_id))
    }

    /// Process every bundle, then reproject, export and clean up as
    /// configured. Consumes the orchestrator and returns the ledger.
    pub fn run(mut self) -> PlaiceResult<ArtifactLedger> {
        log::info!("Starting run {}", self.run_id);
        fs::create_dir_all(&self.output_dir)?;

        let settings = serde_json::to_string_pretty(&self.config)
            .map_err(|e| crate::types::PlaiceError::Config(e.to_string()))?;
        fs::write(self.settings_path(), settings)?;

        let mut runlog = RunLog::create(self.log_path())?;
        let bundles = self.enumerate_bundles();
        runlog.note(&format!(
            "run {} started with {} bundles",
            self.run_id,
            bundles.len()
        ));

        for (id, bundle) in bundles.iter().enumerate() {
            log::info!("Processing bundle {} of {}", id + 1, bundles.len());
            runlog.note(&format!("bundle {}: {:?}", id, bundle.inputs));
            self.process_bundle(id, bundle, &mut runlog);
        }

        if self.config.output_projection {
            self.reproject_pass(&mut runlog);
        }

        self.cleanup_pass(&mut runlog);

        for (kind, count) in self.ledger.counts() {
            runlog.note(&format!("{}: {} artifacts", kind, count));
        }
        runlog.note(&format!("run {} finished", self.run_id));
        let log_path = runlog.finish();

        if self.config.delete_run_text_files {
            remove_quietly(&self.settings_path());
            remove_quietly(&log_path);
        }

        log::info!("Run {} finished", self.run_id);
        Ok(self.ledger)
    }

    fn enumerate_bundles(&self) -> Vec<Bundle> {
        if self.config.merge_tiles {
            vec![Bundle {
                inputs: self.config.inputs.clone(),
            }]
        } else {
            self.config
                .inputs
                .iter()
                .map(|p| Bundle::single(p.clone()))
                .collect()
        }
    }

    /// One bundle through the stage chain. Stage failures abort only the
    /// downstream chain of the affected artifact.
    fn process_bundle(&mut self, id: BundleId, bundle: &Bundle, runlog: &mut RunLog) {
        let l1r = self.invoke(Stage::RawConvert, &bundle.raw_artifacts(), None);
        if l1r.is_empty() {
            log::warn!("Bundle {} produced no L1R output, skipping", id);
            runlog.note(&format!("bundle {}: no l1r output", id));
            return;
        }
        for artifact in &l1r {
            runlog.note(&format!("bundle {}: l1r {}", id, artifact.path.display()));
            self.ledger.record(id, ArtifactKind::L1R, artifact.clone());
        }
        self.export_all(&l1r);

        for l1r_artifact in &l1r {
            let single = std::slice::from_ref(l1r_artifact);

            // VIS-SWIR branch
            if self.config.atmospheric_correction {
                let mut l2r = self.invoke(Stage::AtmosphericCorrect, single, None);
                if let Some(method) = self.config.adjacency_method {
                    if !l2r.is_empty() {
                        log::info!("Applying {} adjacency correction", method);
                        // Adjacency output replaces the L2R list downstream
                        l2r = self.invoke(Stage::AdjacencyCorrect, &l2r, None);
                    }
                }
                if l2r.is_empty() {
                    log::warn!(
                        "No L2R output for {}, skipping parameter derivation",
                        l1r_artifact.path.display()
                    );
                } else {
                    for artifact in &l2r {
                        runlog.note(&format!("bundle {}: l2r {}", id, artifact.path.display()));
                        self.ledger.record(id, ArtifactKind::L2R, artifact.clone());
                    }
                    self.export_all(&l2r);

                    let groups = self.config.derived_parameters.clone();
                    for group in &groups {
                        for l2r_artifact in &l2r {
                            let l2w = self.invoke(
                                Stage::DeriveParameters,
                                std::slice::from_ref(l2r_artifact),
                                Some(group),
                            );
                            for artifact in &l2w {
                                runlog.note(&format!(
                                    "bundle {}: l2w [{}] {}",
                                    id,
                                    group,
                                    artifact.path.display()
                                ));
                                self.ledger.record(id, ArtifactKind::L2W, artifact.clone());
                            }
                            self.export_all(&l2w);
                        }
                    }
                }
            }

            // Thermal branch, independent of the VIS-SWIR outcome
            if self.config.thermal_correction {
                let l2t = self.invoke(Stage::ThermalCorrect, single, None);
                for artifact in &l2t {
                    runlog.note(&format!("bundle {}: l2t {}", id, artifact.path.display()));
                    self.ledger.record(id, ArtifactKind::L2T, artifact.clone());
                }
                self.export_all(&l2t);
            }
        }
    }

    /// Dispatch one stage invocation. Missing operations, errors and empty
    /// results all collapse to "no output".
    fn invoke(&self, stage: Stage, inputs: &[Artifact], group: Option<&str>) -> Vec<Artifact> {
        let Some(op) = self.stages.op(stage) else {
            log::warn!("No operation registered for stage {}, skipping", stage);
            return Vec::new();
        };
        let ctx = StageContext {
            config: &self.config,
            store: self.store,
            run_id: &self.run_id,
            output_dir: &self.output_dir,
            parameter_group: group,
        };
        match op.run(inputs, &ctx) {
            Ok(outputs) => outputs,
            Err(e) => {
                log::warn!("Stage {} failed: {}", stage, e);
                Vec::new()
            }
        }
    }

    /// Reproject every recorded artifact of every designated kind,
    /// recording the siblings. Per-artifact failures are logged and
    /// skipped.
    fn reproject_pass(&mut self, runlog: &mut RunLog) {
        let targets = self.config.reproject_targets.clone();
        let bundle_ids = self.ledger.all_bundle_ids();
        for kind in targets {
            for &id in &bundle_ids {
                let artifacts = self.ledger.artifacts_for(id, kind).to_vec();
                for artifact in artifacts {
                    let engine = ReprojectionEngine::new(&self.config, self.store);
                    match engine.reproject(&artifact, None) {
                        Ok(reprojected) => {
                            runlog.note(&format!(
                                "bundle {}: {} reprojected {}",
                                id,
                                kind,
                                reprojected.path.display()
                            ));
                            self.export_one(&reprojected);
                            self.ledger.record_reprojected(id, kind, reprojected);
                        }
                        Err(e) => {
                            log::warn!(
                                "Reprojection of {} failed: {}",
                                artifact.path.display(),
                                e
                            );
                            runlog.note(&format!(
                                "bundle {}: reprojection of {} failed: {}",
                                id,
                                artifact.path.display(),
                                e
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Delete the files of every kind flagged for deletion and clear their
    /// ledger entries. Best-effort: already-absent files are not errors, and
    /// re-running over a cleared stage is a no-op.
    fn cleanup_pass(&mut self, runlog: &mut RunLog) {
        let kinds = self.config.delete_kinds.clone();
        for kind in kinds {
            for id in self.ledger.all_bundle_ids() {
                let paths: Vec<PathBuf> = self
                    .ledger
                    .artifacts_for(id, kind)
                    .iter()
                    .map(|a| a.path.clone())
                    .collect();
                if paths.is_empty() {
                    continue;
                }
                for path in &paths {
                    remove_quietly(path);
                }
                runlog.note(&format!(
                    "bundle {}: deleted {} {} artifacts",
                    id,
                    paths.len(),
                    kind
                ));
                self.ledger.clear(id, kind);
            }
        }
    }

    fn export_all(&self, artifacts: &[Artifact]) {
        for artifact in artifacts {
            self.export_one(artifact);
        }
    }

    fn export_one(&self, artifact: &Artifact) {
        let Some(exporter) = &self.exporter else {
            return;
        };
        if !self.config.export_kinds.contains(&artifact.kind) {
            return;
        }
        if let Err(e) = exporter.export(artifact, self.store) {
            log::warn!("Export of {} failed: {}", artifact.path.display(), e);
        }
    }
}

/// Best-effort removal: a missing file is not an error.
fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::debug!("Could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryStore;

    fn config_with_inputs(inputs: &[&str]) -> RunConfig {
        RunConfig {
            inputs: inputs.iter().map(PathBuf::from).collect(),
            ..RunConfig::default()
        }
    }

    #[test]
    fn test_enumerate_bundles_one_per_input() {
        let store = MemoryStore::new();
        let orch = PipelineOrchestrator::new(
            config_with_inputs(&["scene_a", "scene_b"]),
            StageSet::new(),
            &store,
        )
        .unwrap();
        let bundles = orch.enumerate_bundles();
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0], Bundle::single("scene_a"));
    }

    #[test]
    fn test_enumerate_bundles_merged() {
        let store = MemoryStore::new();
        let mut config = config_with_inputs(&["tile_a", "tile_b"]);
        config.merge_tiles = true;
        let orch = PipelineOrchestrator::new(config, StageSet::new(), &store).unwrap();
        let bundles = orch.enumerate_bundles();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].inputs.len(), 2);
    }

    #[test]
    fn test_run_id_defaults_to_timestamp() {
        let store = MemoryStore::new();
        let orch =
            PipelineOrchestrator::new(config_with_inputs(&["scene"]), StageSet::new(), &store)
                .unwrap();
        // %Y%m%d_%H%M%S
        assert_eq!(orch.run_id().len(), 15);
    }

    #[test]
    fn test_explicit_run_id_kept() {
        let store = MemoryStore::new();
        let mut config = config_with_inputs(&["scene"]);
        config.run_id = Some("test_run".to_string());
        let orch = PipelineOrchestrator::new(config, StageSet::new(), &store).unwrap();
        assert_eq!(orch.run_id(), "test_run");
    }

    #[test]
    fn test_remove_quietly_on_missing_file() {
        remove_quietly(Path::new("definitely_not_here.nc"));
    }
}
