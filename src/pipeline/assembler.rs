//! End-to-end build: raw generation, payload bricking and container assembly
//!
//! The run is a straight line of stages, each returning `Result`:
//!
//! 1. create the raw backing store
//! 2. stream the field into it
//! 3. (container output only) placeholders, payload, histograms,
//!    acceleration data, metadata, checksummed write
//!
//! Any failure after step 1 closes the container and deletes the raw store
//! unless it is to be kept. A container file only appears on disk once the
//! final write succeeds.

use std::path::PathBuf;
use std::time::Instant;

use crate::bricking::{
    combine_average, simple_max_min, BrickingEngine, FlatFileRequest, OctreeBricker,
};
use crate::container::block::{ContainerBlock, PlaceholderBlock};
use crate::container::{
    ChecksumScheme, CompressionScheme, ContainerFile, Endianness, GlobalHeader, KeyValueBlock,
    MaxMin, MaxMinBlock, RasterBlock, CONTAINER_EXTENSION,
};
use crate::core::{Error, ProgressSink, Result};
use crate::generation::{GeneratorConfig, VolumeWriter};
use crate::histogram::{GradientHistograms, HistogramEngine};
use crate::streaming::raw_file::has_extension;
use crate::streaming::{raw_path_for, BackingStore, BrickPlan, BrickSource, LargeRawFile};
use crate::voxel::{SampleFormat, VolumeDimensions};

/// Largest 1-D histogram stored in the container
pub const MAX_HISTOGRAM_BUCKETS: usize = 4096;

pub const TOC_BLOCK_ID: &str = "Test TOC Volume 1";
pub const RASTER_BLOCK_ID: &str = "Test Volume 1";

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    /// Raw intermediate, if it is still on disk
    pub raw_path: Option<PathBuf>,
    pub raw_bytes: u64,
    pub container_path: Option<PathBuf>,
    pub container_bytes: u64,
    /// LOD levels of the payload; 0 for raw-only runs
    pub lod_levels: usize,
    pub histogram_buckets: usize,
    pub global_range: Option<MaxMin>,
}

/// Fixed parameters of one run
struct Run<'a> {
    config: &'a GeneratorConfig,
    dims: VolumeDimensions,
    format: SampleFormat,
    raw_path: PathBuf,
    progress: &'a dyn ProgressSink,
}

/// Payload block plus the acceleration data gathered while bricking it
struct Payload {
    block: ContainerBlock,
    acceleration: MaxMinBlock,
}

/// What the derived-data stage hands to the write stage
struct Derived {
    lod_levels: usize,
    histogram_buckets: usize,
}

/// Drives a build with pluggable bricking and histogram engines
#[derive(Debug, Clone)]
pub struct Assembler<E: BrickingEngine = OctreeBricker, H: HistogramEngine = GradientHistograms> {
    bricker: E,
    histograms: H,
}

impl Assembler {
    /// Default engines, bricking within the configured memory budget
    pub fn for_config(config: &GeneratorConfig) -> Self {
        let budget = config.memory_budget_mb.saturating_mul(1024 * 1024);
        Self::new(OctreeBricker::new(budget), GradientHistograms)
    }
}

impl<E: BrickingEngine, H: HistogramEngine> Assembler<E, H> {
    pub fn new(bricker: E, histograms: H) -> Self {
        Self { bricker, histograms }
    }

    /// Run the whole pipeline for `config`
    pub fn build(&self, config: &GeneratorConfig, progress: &dyn ProgressSink) -> Result<BuildReport> {
        let mut container = None;
        self.run(config, progress, &mut container)
    }

    fn run(
        &self,
        config: &GeneratorConfig,
        progress: &dyn ProgressSink,
        container_slot: &mut Option<ContainerFile>,
    ) -> Result<BuildReport> {
        config.validate()?;
        let run = Run {
            config,
            dims: config.dimensions()?,
            format: config.format()?,
            raw_path: raw_path_for(&config.output, CONTAINER_EXTENSION),
            progress,
        };

        let mut raw = self.create_store(&run)?;
        let raw_bytes = match self.generate(&run, &mut raw) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.abort(&run, &mut raw, None, e)),
        };

        if !has_extension(&config.output, CONTAINER_EXTENSION) {
            raw.close()?;
            log::info!("Wrote raw volume {}", run.raw_path.display());
            return Ok(BuildReport {
                raw_path: Some(run.raw_path.clone()),
                raw_bytes,
                container_path: None,
                container_bytes: 0,
                lod_levels: 0,
                histogram_buckets: 0,
                global_range: None,
            });
        }

        let container = container_slot.insert(ContainerFile::new(&config.output));
        match self.assemble(&run, container, &mut raw) {
            Ok((derived, range, container_bytes)) => Ok(BuildReport {
                raw_path: config.keep_raw.then(|| run.raw_path.clone()),
                raw_bytes,
                container_path: Some(config.output.clone()),
                container_bytes,
                lod_levels: derived.lod_levels,
                histogram_buckets: derived.histogram_buckets,
                global_range: range,
            }),
            Err(e) => Err(self.abort(&run, &mut raw, Some(container), e)),
        }
    }

    fn create_store(&self, run: &Run<'_>) -> Result<LargeRawFile> {
        let size = run.dims.byte_size(run.format)?;
        let mut raw = LargeRawFile::new(&run.raw_path);
        raw.create(size).map_err(|e| {
            log::error!("Unable to create file {}", run.raw_path.display());
            Error::creation(&run.raw_path, e)
        })?;
        Ok(raw)
    }

    fn generate(&self, run: &Run<'_>, raw: &mut LargeRawFile) -> Result<u64> {
        let field = run.config.field();
        log::info!(
            "Generating {} {}-bit {} volume into {}",
            run.dims,
            run.format.bits(),
            field.name(),
            run.raw_path.display()
        );
        VolumeWriter::new(run.dims, field, run.progress).write(run.format, raw)
    }

    /// Steps 4 to 11; returns the derived summary, value range and container size
    fn assemble(
        &self,
        run: &Run<'_>,
        container: &mut ContainerFile,
        raw: &mut LargeRawFile,
    ) -> Result<(Derived, Option<MaxMin>, u64)> {
        container.set_global_header(GlobalHeader::with_checksum(ChecksumScheme::Md5));
        container.add_block(PlaceholderBlock::new("Test Block 1", CompressionScheme::None))?;
        container.add_block(PlaceholderBlock::new("Test Block 2", CompressionScheme::None))?;

        let Payload { block, acceleration } = if run.config.use_toc {
            self.bricked_payload(run, raw)?
        } else {
            self.raster_payload(run, raw)?
        };
        let payload_index = container.add_block(block)?;
        self.release_raw(run, raw)?;

        let derived = self.derive(run, container, payload_index, acceleration)?;
        let range = match container.blocks().last() {
            Some(ContainerBlock::MaxMin(acc)) if !acc.global.is_empty() => Some(acc.global),
            _ => None,
        };

        run.progress.stage("Storing metadata...");
        container.add_block(metadata_block(run))?;

        run.progress.stage("Writing UVF file...");
        run.progress.stage("Computing checksum...");
        let bytes = container.create()?;
        container.close();
        log::info!("Wrote {} ({} bytes)", container.path().display(), bytes);
        Ok((derived, range, bytes))
    }

    /// TOC path: brick straight from the raw file on disk
    fn bricked_payload(&self, run: &Run<'_>, raw: &mut LargeRawFile) -> Result<Payload> {
        let plan = BrickPlan::new(run.dims, run.config.brick_size, BrickSource::FlatFile)?;
        raw.close()?;

        let request = FlatFileRequest {
            source: raw.path(),
            format: run.format,
            component_count: 1,
            dims: run.dims,
            voxel_spacing: plan.scale,
            brick_size: plan.brick_size,
            brick_overlap: plan.brick_overlap,
            allow_compression: run.config.compress,
            allow_multi_resolution: true,
            memory_budget: run.config.memory_budget_mb.saturating_mul(1024 * 1024),
            block_id: TOC_BLOCK_ID,
        };
        let mut acceleration = MaxMinBlock::new(1);
        let started = Instant::now();
        let toc = self
            .bricker
            .flat_file_to_bricked_lod(&request, &mut acceleration, run.progress)
            .map_err(as_integrity)?;
        log::debug!("Bricked TOC in {:.2}s", started.elapsed().as_secs_f64());

        Ok(Payload { block: toc.into(), acceleration })
    }

    /// Raster path: describe the grid, brick it from the open store, verify
    fn raster_payload(&self, run: &Run<'_>, raw: &mut LargeRawFile) -> Result<Payload> {
        let plan = BrickPlan::new(run.dims, run.config.brick_size, BrickSource::Raster)?;
        let mut block = RasterBlock::from_plan(RASTER_BLOCK_ID, &plan, run.format);
        let mut acceleration = MaxMinBlock::new(1);

        let started = Instant::now();
        match run.format {
            SampleFormat::U8 => self.bricker.raster_to_bricked_lod::<u8>(
                &mut block,
                raw,
                combine_average::<u8>,
                simple_max_min::<u8>,
                &mut acceleration,
                run.progress,
            ),
            SampleFormat::U16 => self.bricker.raster_to_bricked_lod::<u16>(
                &mut block,
                raw,
                combine_average::<u16>,
                simple_max_min::<u16>,
                &mut acceleration,
                run.progress,
            ),
        }
        .map_err(as_integrity)?;
        log::debug!("Bricked raster in {:.2}s", started.elapsed().as_secs_f64());

        block.verify().map_err(Error::Validation)?;
        Ok(Payload { block: block.into(), acceleration })
    }

    /// Histograms from the appended payload, then the acceleration block
    fn derive(
        &self,
        run: &Run<'_>,
        container: &mut ContainerFile,
        payload_index: usize,
        acceleration: MaxMinBlock,
    ) -> Result<Derived> {
        let volume = container
            .block(payload_index)
            .and_then(ContainerBlock::volume)
            .ok_or_else(|| Error::Assembly("Payload block holds no brick data".to_string()))?;
        let lod_levels = volume.level_count();

        run.progress.stage("Computing 1D Histogram...");
        let mut hist1d = self
            .histograms
            .compute_1d(volume, 0)
            .map_err(|e| as_derived(e, "1D"))?;
        hist1d.compress(MAX_HISTOGRAM_BUCKETS);

        run.progress.stage("Computing 2D Histogram...");
        let hist2d = self
            .histograms
            .compute_2d(volume, 0, hist1d.len(), acceleration.global_max())
            .map_err(|e| as_derived(e, "2D"))?;

        let histogram_buckets = hist1d.len();
        run.progress.stage("Storing histogram data...");
        container.add_block(hist1d)?;
        container.add_block(hist2d)?;

        run.progress.stage("Storing acceleration data...");
        container.add_block(acceleration)?;

        Ok(Derived { lod_levels, histogram_buckets })
    }

    /// Close the raw store, deleting it unless it is to be kept
    fn release_raw(&self, run: &Run<'_>, raw: &mut LargeRawFile) -> Result<()> {
        if run.config.keep_raw {
            raw.close()?;
        } else {
            raw.delete()?;
        }
        Ok(())
    }

    /// Clean up after a fatal error and hand it back
    fn abort(
        &self,
        run: &Run<'_>,
        raw: &mut LargeRawFile,
        container: Option<&mut ContainerFile>,
        error: Error,
    ) -> Error {
        log::error!("{}", error);
        if let Some(container) = container {
            container.close();
        }
        let cleanup = if run.config.keep_raw { raw.close() } else { raw.delete() };
        if let Err(e) = cleanup {
            log::warn!("Failed to clean up {}: {}", raw.path().display(), e);
        }
        error
    }
}

/// Provenance pairs stored with every container
fn metadata_block(run: &Run<'_>) -> KeyValueBlock {
    let mut block = KeyValueBlock::new();
    block.add_pair(
        "Data Source",
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    );
    block.add_pair(
        "Description",
        format!("Synthetic {} volume ({})", run.config.field().name(), run.dims),
    );
    block.add_pair("Source Endianness", Endianness::host().name());
    block.add_pair("Source Type", "integer");
    block.add_pair("Source Bit width", run.format.bits().to_string());
    block
}

fn as_integrity(error: Error) -> Error {
    match error {
        Error::GenerationIntegrity(_) => error,
        other => Error::GenerationIntegrity(other.to_string()),
    }
}

fn as_derived(error: Error, kind: &'static str) -> Error {
    match error {
        Error::DerivedData { .. } => error,
        other => Error::DerivedData { kind, reason: other.to_string() },
    }
}
