use crate::config::PrepConfig;
use crate::core::alignment::LegacyAligner;
use crate::core::coherence::{CoherenceMasker, CoherenceSpec};
use crate::core::extent::ExtentResolver;
use crate::core::grid::GridValidator;
use crate::core::metadata::MetadataManager;
use crate::core::multilook::{MultilookParams, MultilookProcessor};
use crate::io::{
    coherence_path_for, prepared_path, GeoTiffWriter, PixelWindow, RasterHeader, RasterReader,
};
use crate::types::{
    BatchFailure, CropPolicy, ExtentBox, GeoTransform, PrepError, PrepResult, ProcessingStage,
    RasterFailure, RasterKind,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One raster handed over by the format-conversion step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterInput {
    pub path: PathBuf,
    pub kind: RasterKind,
}

impl RasterInput {
    pub fn new<P: Into<PathBuf>>(path: P, kind: RasterKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Report for one prepared output raster
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRaster {
    pub source: PathBuf,
    pub output: PathBuf,
    pub kind: RasterKind,
    pub stage: ProcessingStage,
    pub geotransform: GeoTransform,
    pub cols: usize,
    pub rows: usize,
    /// Mean NaN fraction of the averaged grid; `None` for pass-through copies
    pub nan_fraction_mean: Option<f64>,
    /// Copied unchanged apart from the metadata
    pub bypassed: bool,
}

impl PreparedRaster {
    /// Geographic extent of the output grid
    pub fn extent(&self) -> ExtentBox {
        let x0 = self.geotransform.top_left_x;
        let y0 = self.geotransform.top_left_y;
        let x1 = x0 + self.cols as f64 * self.geotransform.pixel_width;
        let y1 = y0 + self.rows as f64 * self.geotransform.pixel_height;
        ExtentBox {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        }
    }

    pub fn x_step(&self) -> f64 {
        self.geotransform.pixel_width
    }

    pub fn y_step(&self) -> f64 {
        self.geotransform.pixel_height
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }
}

/// Prepares a raster batch onto one common extent and resolution
pub struct PrepDriver {
    config: PrepConfig,
}

impl PrepDriver {
    /// Create a driver; the configuration is validated before any raster is opened
    pub fn new(config: PrepConfig) -> PrepResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Prepare every raster in `inputs`.
    ///
    /// The extent is resolved and grid-checked once for the whole batch, then each
    /// raster is prepared independently on the worker pool. Every failing raster is
    /// reported in a single [`PrepError::Batch`].
    pub fn run(&self, inputs: &[RasterInput]) -> PrepResult<Vec<PreparedRaster>> {
        if inputs.is_empty() {
            return Err(PrepError::Configuration("no rasters to prepare".to_string()));
        }

        log::info!(
            "Preparing {} rasters: {} looks, crop option {}",
            inputs.len(),
            self.config.looks.factor(),
            self.config.crop.option()
        );

        self.check_output_paths(inputs)?;
        let headers = self.read_headers(inputs)?;

        let extent = ExtentResolver::resolve(&headers, self.config.crop, &self.config.custom_bounds)?;
        if self.config.crop != CropPolicy::Unchanged {
            GridValidator::new(self.config.grid_tolerance).check_extent(&headers[0], &extent)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count())
            .build()
            .map_err(|e| PrepError::Processing(format!("Failed to build worker pool: {}", e)))?;

        log::debug!("Dispatching on {} workers", pool.current_num_threads());

        let results: Vec<(PathBuf, PrepResult<PreparedRaster>)> = pool.install(|| {
            headers
                .par_iter()
                .map(|header| (header.path.clone(), self.prepare_raster(header, &extent)))
                .collect()
        });

        let total = results.len();
        let mut prepared = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for (path, result) in results {
            match result {
                Ok(raster) => prepared.push(raster),
                Err(error) => {
                    log::error!("Failed to prepare {}: {}", path.display(), error);
                    failures.push(RasterFailure { path, error });
                }
            }
        }

        if !failures.is_empty() {
            return Err(PrepError::Batch(BatchFailure { failures, total }));
        }

        log::info!("✅ Prepared {} rasters", prepared.len());
        Ok(prepared)
    }

    fn output_path(&self, input: &Path) -> PathBuf {
        prepared_path(
            input,
            self.config.output_dir.as_deref(),
            self.config.looks,
            self.config.crop,
        )
    }

    /// Two inputs mapping to one output file would overwrite each other
    fn check_output_paths(&self, inputs: &[RasterInput]) -> PrepResult<()> {
        let mut seen: HashMap<PathBuf, &Path> = HashMap::with_capacity(inputs.len());
        for input in inputs {
            let output = self.output_path(&input.path);
            if let Some(previous) = seen.insert(output.clone(), &input.path) {
                return Err(PrepError::Configuration(format!(
                    "{} and {} both prepare to {}",
                    previous.display(),
                    input.path.display(),
                    output.display()
                )));
            }
        }
        Ok(())
    }

    /// Open every input, collecting all failures before giving up
    fn read_headers(&self, inputs: &[RasterInput]) -> PrepResult<Vec<RasterHeader>> {
        let mut headers = Vec::with_capacity(inputs.len());
        let mut failures = Vec::new();

        for input in inputs {
            match RasterReader::read_header(&input.path, input.kind) {
                Ok(header) => headers.push(header),
                Err(error) => failures.push(RasterFailure {
                    path: input.path.clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(headers)
        } else {
            Err(PrepError::Batch(BatchFailure {
                failures,
                total: inputs.len(),
            }))
        }
    }

    /// Coherence raster and threshold for `header`, if it is masked at all
    fn coherence_for(&self, header: &RasterHeader) -> PrepResult<Option<CoherenceSpec>> {
        if header.kind != RasterKind::Interferogram {
            return Ok(None);
        }
        let path = coherence_path_for(&header.path, &self.config.coherence)?;
        let threshold = path.as_ref().and(self.config.coherence.threshold);
        CoherenceSpec::from_parts(path, threshold)
    }

    /// Mask, multilook and write one raster
    pub fn prepare_raster(
        &self,
        header: &RasterHeader,
        extent: &ExtentBox,
    ) -> PrepResult<PreparedRaster> {
        let output = self.output_path(&header.path);

        let coherence = self.coherence_for(header)?;
        let metadata =
            MetadataManager::prepare(header.kind, header.stage_metadata()?, coherence.is_some())?;

        if self.config.looks.is_identity()
            && self.config.crop == CropPolicy::Unchanged
            && coherence.is_none()
        {
            GeoTiffWriter::copy_with_metadata(&header.path, &output, &metadata)?;
            log::info!(
                "Copied {} -> {} ({})",
                header.path.display(),
                output.display(),
                metadata.stage()
            );
            return Ok(PreparedRaster {
                source: header.path.clone(),
                output,
                kind: header.kind,
                stage: metadata.stage(),
                geotransform: header.geotransform,
                cols: header.cols,
                rows: header.rows,
                nan_fraction_mean: None,
                bypassed: true,
            });
        }

        let mut window = RasterReader::read_window(header, extent)?;

        if let Some(spec) = &coherence {
            let coherence_header = RasterReader::read_header(&spec.path, RasterKind::Coherence)?;
            let coherence_window = RasterReader::read_window(&coherence_header, extent)?;
            let (masked, rejected) =
                CoherenceMasker::new(spec.threshold).apply(window, &coherence_window)?;
            log::debug!(
                "{}: {} pixels below coherence {} in {}",
                header.path.display(),
                rejected,
                spec.threshold,
                spec.path.display()
            );
            window = masked;
        }

        let processor = MultilookProcessor::new(MultilookParams {
            looks: self.config.looks,
            nan_threshold: self.config.nan_threshold,
        })?;
        let mut result = processor.apply_multilook(&window, &header.geotransform, extent)?;

        if self.config.legacy_alignment && !self.config.looks.is_identity() {
            let source = RasterReader::read_band(header)?;
            let pixels = PixelWindow::for_extent(&header.geotransform, extent)?;
            let (aligned, _) =
                LegacyAligner::new(self.config.looks)?.apply(result.data, &source, &pixels)?;
            result.data = aligned;
        }

        GeoTiffWriter::write(
            &output,
            &result.data,
            &result.transform,
            &header.projection,
            &metadata,
        )?;

        let (rows, cols) = result.data.dim();
        let nan_fraction_mean = result.mean_nan_fraction();
        log::info!(
            "Prepared {} -> {} ({}x{}, {}, mean NaN fraction {:.3})",
            header.path.display(),
            output.display(),
            cols,
            rows,
            metadata.stage(),
            nan_fraction_mean
        );

        Ok(PreparedRaster {
            source: header.path.clone(),
            output,
            kind: header.kind,
            stage: metadata.stage(),
            geotransform: result.transform,
            cols,
            rows,
            nan_fraction_mean: Some(nan_fraction_mean),
            bypassed: false,
        })
    }
}
