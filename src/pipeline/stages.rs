use crate::config::RunConfig;
use crate::io::RasterStore;
use crate::types::{Artifact, PlaiceResult, Stage};
use std::collections::BTreeMap;
use std::path::Path;

/// Immutable per-Run view handed to every stage invocation.
///
/// Stage operations read configuration and storage only through this
/// context; nothing in the pipeline consults process-wide state.
pub struct StageContext<'a> {
    pub config: &'a RunConfig,
    pub store: &'a dyn RasterStore,
    pub run_id: &'a str,
    pub output_dir: &'a Path,
    /// Set only for `Stage::DeriveParameters`, one invocation per group
    pub parameter_group: Option<&'a str>,
}

/// External stage collaborator.
///
/// An empty `Ok` result signals stage failure or skip, not a crash; the
/// orchestrator treats it as "no output" and continues with remaining work.
pub trait StageOperation: Send + Sync {
    fn run(&self, inputs: &[Artifact], ctx: &StageContext<'_>) -> PlaiceResult<Vec<Artifact>>;
}

/// Optional export collaborator, e.g. a GeoTIFF writer living outside the
/// crate. Failures are logged and never abort the Run.
pub trait ArtifactExporter: Send + Sync {
    fn export(&self, artifact: &Artifact, store: &dyn RasterStore) -> PlaiceResult<()>;
}

/// Dispatch table from pipeline stage to its operation.
///
/// A stage without a registered operation is skipped with a warning, which
/// keeps partial deployments (e.g. no thermal collaborator available)
/// harmless.
#[derive(Default)]
pub struct StageSet {
    ops: BTreeMap<Stage, Box<dyn StageOperation>>,
}

impl StageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, stage: Stage, op: Box<dyn StageOperation>) -> Self {
        self.ops.insert(stage, op);
        self
    }

    pub fn op(&self, stage: Stage) -> Option<&dyn StageOperation> {
        self.ops.get(&stage).map(|b| b.as_ref())
    }

    pub fn registered(&self) -> Vec<Stage> {
        self.ops.keys().copied().collect()
    }
}
