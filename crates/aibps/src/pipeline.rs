//! End-to-end index run
//!
//! For every pillar recipe the pipeline fetches the raw inputs, aligns them
//! to month ends, builds the normalized component columns and aggregates them
//! into the pillar; the pillars are then combined into the composite.

use crate::catalog::{Catalog, CombineMode, ComponentRecipe, PillarRecipe};
use crate::config::{ConfigError, IndexConfig};
use crate::error::PipelineError;
use aibps_core::{
    AuditLog, CompositeBuilder, CompositeIndex, Condition, MonthlySeries, Normalizer, Pillar,
    SeriesSet, aggregate_mean, transform,
};
use aibps_data::SeriesSource;
use aibps_output::{ExportError, ExportFormat, Exporter, RunSummary, Table};
use polars::prelude::PolarsResult;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct IndexRun {
    /// The composite index
    pub index: CompositeIndex,
    /// Pillars that could be produced, in catalog order
    pub pillars: Vec<Pillar>,
    /// Every condition absorbed during the run
    pub audit: AuditLog,
}

impl IndexRun {
    /// Summary of the run.
    pub fn summary(&self, name: impl Into<String>) -> RunSummary {
        RunSummary::new(name, &self.index, &self.audit)
    }

    /// The composite table followed by one table per pillar.
    pub fn tables(&self) -> Vec<Table> {
        std::iter::once(Table::from_composite(&self.index))
            .chain(self.pillars.iter().map(Table::from_pillar))
            .collect()
    }

    /// Write every table into `dir`, returning the written paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a table fails to export.
    pub fn export(&self, dir: &Path, format: ExportFormat) -> Result<Vec<PathBuf>, ExportError> {
        std::fs::create_dir_all(dir)?;
        self.tables()
            .iter()
            .map(|table| {
                let path = dir.join(table.file_name(format));
                table.export_to_file(&path, format)?;
                debug!(path = %path.display(), rows = table.len(), "wrote table");
                Ok(path)
            })
            .collect()
    }
}

/// Runs a [`Catalog`] against a series source.
#[derive(Debug, Clone)]
pub struct IndexPipeline {
    config: IndexConfig,
    catalog: Catalog,
}

impl IndexPipeline {
    /// Create a pipeline.
    pub const fn new(config: IndexConfig, catalog: Catalog) -> Self {
        Self { config, catalog }
    }

    /// Effective configuration.
    pub const fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Recipes being run.
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Run every recipe and build the composite.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for an unusable configuration,
    /// [`PipelineError::Polars`] when a series computation fails and
    /// [`PipelineError::Composite`] when no composite row survives.
    pub fn run<S: SeriesSource + ?Sized>(&self, source: &S) -> Result<IndexRun, PipelineError> {
        self.run_with_progress(source, |_| {})
    }

    /// Like [`Self::run`], calling `progress` after each pillar recipe.
    pub fn run_with_progress<S, F>(
        &self,
        source: &S,
        mut progress: F,
    ) -> Result<IndexRun, PipelineError>
    where
        S: SeriesSource + ?Sized,
        F: FnMut(&PillarRecipe),
    {
        self.config.validate()?;
        info!(
            source = source.name(),
            pillars = self.catalog.len(),
            "starting index run"
        );

        let mut audit = AuditLog::new();
        let mut pillars = Vec::with_capacity(self.catalog.len());
        for recipe in self.catalog.pillars() {
            if let Some(pillar) = self.build_pillar(recipe, source, &mut audit)? {
                pillars.push(pillar);
            }
            progress(recipe);
        }

        let builder = CompositeBuilder::new(self.config.composite());
        let index = match builder.build(&pillars, &mut audit) {
            Ok(index) => index,
            Err(source) => return Err(PipelineError::Composite { source, audit }),
        };
        info!(
            rows = index.len(),
            pillars = pillars.len(),
            warnings = audit.warning_count(),
            "index run complete"
        );

        Ok(IndexRun {
            index,
            pillars,
            audit,
        })
    }

    fn build_pillar<S: SeriesSource + ?Sized>(
        &self,
        recipe: &PillarRecipe,
        source: &S,
        audit: &mut AuditLog,
    ) -> Result<Option<Pillar>, PipelineError> {
        let mut components = SeriesSet::new();
        for component in &recipe.components {
            if let Some(series) = self.build_component(component, source, audit)? {
                components.insert(series);
            }
        }
        debug!(
            pillar = %recipe.kind,
            components = components.len(),
            "built components"
        );

        let pillar = recipe.aggregator().aggregate(&components, audit);
        if let Some(pillar) = &pillar {
            info!(
                pillar = %pillar.kind,
                months = pillar.series.observation_count(),
                "pillar ready"
            );
        }
        Ok(pillar)
    }

    fn build_component<S: SeriesSource + ?Sized>(
        &self,
        recipe: &ComponentRecipe,
        source: &S,
        audit: &mut AuditLog,
    ) -> Result<Option<MonthlySeries>, PipelineError> {
        let normalizer = recipe
            .normalization
            .build(&self.config.percentile, self.config.baseline)
            .map_err(ConfigError::from)?;

        let aligned: Vec<MonthlySeries> = recipe
            .inputs
            .iter()
            .filter_map(|id| fetch(source, id, audit))
            .map(|raw| recipe.align.align(&raw))
            .collect();
        if aligned.is_empty() {
            debug!(component = %recipe.name, "no input available");
            return Ok(None);
        }
        let refs: Vec<&MonthlySeries> = aligned.iter().collect();

        let series = match recipe.combine {
            CombineMode::MeanNormalized => {
                let normalized = aligned
                    .iter()
                    .map(|s| prepare(recipe, s, normalizer.as_ref(), audit))
                    .collect::<PolarsResult<Vec<_>>>()?;
                let refs: Vec<&MonthlySeries> = normalized.iter().collect();
                aggregate_mean(recipe.name.as_str(), &refs)
            }
            CombineMode::MeanRaw => {
                let combined = aggregate_mean(recipe.name.as_str(), &refs);
                prepare(recipe, &combined, normalizer.as_ref(), audit)?
            }
            CombineMode::SumRaw => {
                let combined = transform::sum(recipe.name.as_str(), &refs);
                prepare(recipe, &combined, normalizer.as_ref(), audit)?
            }
        };
        debug!(
            component = %recipe.name,
            inputs = aligned.len(),
            normalizer = normalizer.name(),
            "built component"
        );
        Ok(Some(series.renamed(recipe.name.as_str())))
    }
}

/// Fetch one input, recording why it is unusable instead of failing.
fn fetch<S: SeriesSource + ?Sized>(
    source: &S,
    id: &str,
    audit: &mut AuditLog,
) -> Option<aibps_core::TimeSeries> {
    match source.fetch(id) {
        Ok(series) if series.is_empty() => {
            audit.record(Condition::EmptySeries {
                series: id.to_string(),
            });
            None
        }
        Ok(series) => Some(series.renamed(id)),
        Err(e) => {
            audit.record(Condition::SourceUnavailable {
                series: id.to_string(),
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Apply the recipe's transforms, then normalize.
fn prepare(
    recipe: &ComponentRecipe,
    series: &MonthlySeries,
    normalizer: &dyn Normalizer,
    audit: &mut AuditLog,
) -> PolarsResult<MonthlySeries> {
    let transformed = recipe
        .transforms
        .iter()
        .try_fold(series.clone(), |acc, t| t.apply(&acc))?;
    normalizer.normalize(&transformed, audit)
}
