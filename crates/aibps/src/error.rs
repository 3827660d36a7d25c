//! Pipeline errors

use crate::config::ConfigError;
use aibps_core::{AuditLog, CompositeError};
use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors that abort an index run.
///
/// Missing or degraded inputs never end up here; they are recorded in the
/// run's audit log instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configuration is unusable.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A transform or normalization failed to compute.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    /// No composite could be built from what was available.
    #[error("Composite error: {source}")]
    Composite {
        /// Underlying composite failure
        source: CompositeError,
        /// Conditions recorded before the failure
        audit: AuditLog,
    },
}

impl PipelineError {
    /// Conditions recorded before a composite failure.
    pub const fn audit(&self) -> Option<&AuditLog> {
        match self {
            Self::Composite { audit, .. } => Some(audit),
            Self::Config(_) | Self::Polars(_) => None,
        }
    }

    /// Whether the run failed because no pillar could be produced.
    pub const fn is_no_pillars(&self) -> bool {
        matches!(
            self,
            Self::Composite {
                source: CompositeError::NoPillarsAvailable,
                ..
            }
        )
    }

    /// Whether the inputs yielded no composite row at all.
    ///
    /// Covers a run without pillars, one without any core pillar, and one
    /// where every row weighs zero. Configuration and computation failures
    /// are not included.
    pub const fn is_no_composite(&self) -> bool {
        matches!(
            self,
            Self::Composite {
                source: CompositeError::NoPillarsAvailable
                    | CompositeError::NoCoreSignal(_)
                    | CompositeError::ZeroTotalWeight,
                ..
            }
        )
    }
}
