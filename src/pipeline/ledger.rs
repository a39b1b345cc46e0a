use crate::types::{Artifact, ArtifactKind};
use std::collections::BTreeMap;

/// Index of a bundle within its Run
pub type BundleId = usize;

#[derive(Debug, Default, Clone)]
struct KindRecord {
    produced: Vec<Artifact>,
    reprojected: Vec<Artifact>,
}

/// Per-Run record of which artifacts each stage produced for each bundle.
///
/// Purely additive while the Run executes; the only removal is the
/// orchestrator's cleanup `clear` after the underlying files are deleted.
#[derive(Debug, Default)]
pub struct ArtifactLedger {
    entries: BTreeMap<BundleId, BTreeMap<ArtifactKind, KindRecord>>,
}

impl ArtifactLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, bundle: BundleId, kind: ArtifactKind, artifact: Artifact) {
        self.entries
            .entry(bundle)
            .or_default()
            .entry(kind)
            .or_default()
            .produced
            .push(artifact);
    }

    pub fn record_reprojected(&mut self, bundle: BundleId, kind: ArtifactKind, artifact: Artifact) {
        self.entries
            .entry(bundle)
            .or_default()
            .entry(kind)
            .or_default()
            .reprojected
            .push(artifact);
    }

    /// Artifacts recorded for (bundle, kind), in recording order.
    /// Unknown keys yield an empty slice, never an error.
    pub fn artifacts_for(&self, bundle: BundleId, kind: ArtifactKind) -> &[Artifact] {
        self.entries
            .get(&bundle)
            .and_then(|kinds| kinds.get(&kind))
            .map(|r| r.produced.as_slice())
            .unwrap_or(&[])
    }

    /// Reprojected siblings recorded for (bundle, kind).
    pub fn reprojected_for(&self, bundle: BundleId, kind: ArtifactKind) -> &[Artifact] {
        self.entries
            .get(&bundle)
            .and_then(|kinds| kinds.get(&kind))
            .map(|r| r.reprojected.as_slice())
            .unwrap_or(&[])
    }

    pub fn all_bundle_ids(&self) -> Vec<BundleId> {
        self.entries.keys().copied().collect()
    }

    /// Drop the produced list for (bundle, kind) after its files are gone.
    /// Clearing an empty or unknown entry is a no-op.
    pub fn clear(&mut self, bundle: BundleId, kind: ArtifactKind) {
        if let Some(record) = self.entries.get_mut(&bundle).and_then(|k| k.get_mut(&kind)) {
            record.produced.clear();
        }
    }

    /// Produced-artifact counts per kind, for the run summary.
    pub fn counts(&self) -> BTreeMap<ArtifactKind, usize> {
        let mut counts = BTreeMap::new();
        for kinds in self.entries.values() {
            for (kind, record) in kinds {
                *counts.entry(*kind).or_insert(0) += record.produced.len();
            }
        }
        counts
    }
}
