//! One refresh run: list, select, download, decode, render.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use grib2_parser::{DecodeOptions, GridDecoder};
use radar_common::{RadarError, RadarFrame};
use renderer::{ColorRamp, Rasterizer, RenderedImage, StyleConfig};
use tracing::{info, instrument, warn};

use crate::config::RadarConfig;
use crate::fetch::{build_http_client, Fetcher};
use crate::listing::DirectoryLister;
use crate::retry::RetryPolicy;
use crate::selection::{selector_for, LatestSelector};
use crate::storage::ArtifactStore;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// A frame was built from a file other than the cached one.
    Updated(RadarFrame),
    /// The newest upstream file is the one already cached.
    Unchanged,
}

/// Produces frames for the cache.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Build a frame from the newest upstream file. `current` is the source
    /// name of the cached frame, if any.
    async fn produce(&self, current: Option<&str>) -> Result<RefreshOutcome, RadarError>;
}

/// The production [`FrameSource`].
pub struct RefreshPipeline {
    lister: DirectoryLister,
    selector: Box<dyn LatestSelector>,
    fetcher: Fetcher,
    decoder: GridDecoder,
    rasterizer: Arc<Rasterizer>,
    retry: RetryPolicy,
    store: Option<ArtifactStore>,
}

impl RefreshPipeline {
    pub fn new(
        lister: DirectoryLister,
        selector: Box<dyn LatestSelector>,
        fetcher: Fetcher,
        rasterizer: Rasterizer,
    ) -> Self {
        Self {
            lister,
            selector,
            fetcher,
            decoder: GridDecoder::new(DecodeOptions::default()),
            rasterizer: Arc::new(rasterizer),
            retry: RetryPolicy::none(),
            store: None,
        }
    }

    /// Wire up every stage from configuration.
    pub fn from_config(config: &RadarConfig) -> Result<Self, RadarError> {
        let client = build_http_client(&config.http)?;
        let lister =
            DirectoryLister::new(client.clone(), &config.source.base_url, &config.source.suffix);

        let ramp = match &config.render.style_file {
            Some(path) => StyleConfig::from_file(path)?.color_ramp(&config.render.style_name)?,
            None => ColorRamp::nws_reflectivity(),
        };
        let rasterizer = Rasterizer::new(ramp).with_compression(config.render.compression_level);

        let mut pipeline = Self::new(
            lister,
            selector_for(config.source.selector),
            Fetcher::new(client),
            rasterizer,
        )
        .with_retry(RetryPolicy::from(&config.retry));

        if let Some(dir) = &config.cache.cache_dir {
            pipeline = pipeline.with_store(ArtifactStore::open(dir)?);
        }
        Ok(pipeline)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    /// Decode and render off the async workers.
    async fn build_frame(&self, name: String, data: Bytes) -> Result<RadarFrame, RadarError> {
        let decoder = self.decoder.clone();
        let rasterizer = self.rasterizer.clone();

        tokio::task::spawn_blocking(move || -> Result<RadarFrame, RadarError> {
            let start = Instant::now();
            let grid = decoder.decode(&data)?;
            let decoded_ms = start.elapsed().as_millis() as u64;

            let RenderedImage { png, width, height } = rasterizer.render(&grid)?;
            let max_value = grid.value_range().map(|(_, max)| max);
            info!(
                file = %name,
                width,
                height,
                missing = grid.missing_count(),
                max_value = ?max_value,
                decode_ms = decoded_ms,
                duration_ms = start.elapsed().as_millis() as u64,
                "Decoded and rendered radar grid"
            );

            Ok(RadarFrame {
                image: Bytes::from(png),
                source_name: name,
                fetched_at: Utc::now(),
                width,
                height,
                bounds: grid.spec.bbox(),
                valid_time: grid.reference_time,
            })
        })
        .await
        .map_err(|e| RadarError::Internal(format!("Render task failed: {}", e)))?
    }

    async fn persist(&self, frame: &RadarFrame, source: Bytes) {
        let Some(store) = self.store.clone() else {
            return;
        };
        let dir = store.dir().to_path_buf();
        let frame = frame.clone();
        let result = tokio::task::spawn_blocking(move || store.save(&frame, &source))
            .await
            .map_err(|e| RadarError::Internal(e.to_string()))
            .and_then(|r| r);

        if let Err(e) = result {
            warn!(error = %e, dir = %dir.display(), "Failed to persist radar frame");
        }
    }
}

#[async_trait]
impl FrameSource for RefreshPipeline {
    #[instrument(skip(self), fields(base_url = %self.lister.base_url(), selector = self.selector.name()))]
    async fn produce(&self, current: Option<&str>) -> Result<RefreshOutcome, RadarError> {
        let names = self.retry.run("list", || self.lister.list()).await?;

        let name = self
            .selector
            .select(&names)
            .ok_or_else(|| RadarError::EmptyListing {
                url: self.lister.base_url().to_string(),
                suffix: self.lister.suffix().to_string(),
            })?
            .to_string();

        if current == Some(name.as_str()) {
            info!(file = %name, "Latest upstream file is already cached");
            return Ok(RefreshOutcome::Unchanged);
        }

        let url = self.lister.file_url(&name);
        info!(file = %name, url = %url, candidates = names.len(), "Selected latest radar file");

        let data = self.retry.run("download", || self.fetcher.fetch(&url)).await?;
        let frame = self.build_frame(name, data.clone()).await?;
        self.persist(&frame, data).await;

        Ok(RefreshOutcome::Updated(frame))
    }
}
