//! Processing-stage lifecycle for prepared rasters.
//!
//! Every raster carries a `DATA_TYPE` tag set by the conversion stage. Preparation
//! moves it forward exactly once; preparing an already prepared raster leaves the tag
//! where it is, so re-running a batch is a no-op at the metadata level.

use crate::types::{PrepError, PrepResult, ProcessingStage, RasterKind, DATA_TYPE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raster metadata snapshot: the stage tag plus every other default-domain item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    stage: ProcessingStage,
    entries: BTreeMap<String, String>,
}

impl RasterMetadata {
    pub fn new(stage: ProcessingStage) -> Self {
        Self {
            stage,
            entries: BTreeMap::new(),
        }
    }

    /// Build from raw `KEY`/`VALUE` items as read from a dataset.
    ///
    /// A missing tag falls back to the kind's initial stage; an unknown tag fails.
    pub fn from_items<I>(kind: RasterKind, items: I) -> PrepResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut entries: BTreeMap<String, String> = items.into_iter().collect();

        let stage = match entries.remove(DATA_TYPE) {
            Some(tag) => ProcessingStage::from_tag(&tag)?,
            None => kind.initial_stage().ok_or_else(|| {
                PrepError::MetadataState(format!(
                    "{} raster carries no {} tag",
                    kind, DATA_TYPE
                ))
            })?,
        };

        Ok(Self { stage, entries })
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if key == DATA_TYPE {
            return Some(self.stage.tag());
        }
        self.entries.get(key).map(String::as_str)
    }

    /// Copy with an extra or replaced item; the stage tag cannot be set this way
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        if key != DATA_TYPE {
            self.entries.insert(key.to_string(), value.to_string());
        }
        self
    }

    /// Copy with the stage replaced
    pub fn with_stage(mut self, stage: ProcessingStage) -> Self {
        self.stage = stage;
        self
    }

    /// All items to write back, stage tag included
    pub fn items(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((DATA_TYPE, self.stage.tag()))
            .chain(self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

/// Drives the stage transition applied by preparation
pub struct MetadataManager;

impl MetadataManager {
    /// Stage reached by preparing a raster currently at `current`.
    ///
    /// `coherence_applied` only matters for interferogram stages. Stages from another
    /// kind's family cannot be reached by a legitimate upstream raster and are fatal.
    pub fn next_stage(
        kind: RasterKind,
        current: ProcessingStage,
        coherence_applied: bool,
    ) -> PrepResult<ProcessingStage> {
        use ProcessingStage::*;

        let interferometric = matches!(kind, RasterKind::Interferogram | RasterKind::Coherence);

        let next = match (current, coherence_applied) {
            (Orig, false) if interferometric => Multilooked,
            (Orig, true) if interferometric => Coherence,
            (Multilooked, false) if interferometric => Multilooked,
            (Multilooked, true) if interferometric => Coherence,
            (Coherence, _) if interferometric => Coherence,
            (Dem, _) if kind == RasterKind::Dem => MlookedDem,
            (MlookedDem, _) if kind == RasterKind::Dem => MlookedDem,
            (Incidence, _) if kind == RasterKind::Incidence => MlookedIncidence,
            (MlookedIncidence, _) if kind == RasterKind::Incidence => MlookedIncidence,
            (stage, coherence) => {
                return Err(PrepError::MetadataState(format!(
                    "{} tag {} not recognised for a {} raster (coherence applied: {})",
                    DATA_TYPE, stage, kind, coherence
                )))
            }
        };

        Ok(next)
    }

    /// Metadata snapshot for the prepared output
    pub fn prepare(
        kind: RasterKind,
        metadata: RasterMetadata,
        coherence_applied: bool,
    ) -> PrepResult<RasterMetadata> {
        let current = metadata.stage();
        let next = Self::next_stage(kind, current, coherence_applied)?;

        if next == current {
            log::debug!("{} stays at {}", kind, current);
        } else {
            log::debug!("{} stage {} -> {}", kind, current, next);
        }

        Ok(metadata.with_stage(next))
    }
}
