//! Pillar weight vector

use super::CompositeError;
use crate::pillar::PillarKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default weight of each pillar in the composite.
///
/// Pillars without an entry weigh zero. Weights need not sum to one; they are
/// renormalized over the pillars present on each row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PillarWeights(BTreeMap<PillarKind, f64>);

impl Default for PillarWeights {
    fn default() -> Self {
        Self::from_iter([
            (PillarKind::Market, 0.25),
            (PillarKind::CapexSupply, 0.25),
            (PillarKind::Infra, 0.20),
            (PillarKind::Adoption, 0.15),
            (PillarKind::Credit, 0.15),
        ])
    }
}

impl PillarWeights {
    /// An empty weight vector.
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Weight of `kind`, zero when unset.
    pub fn get(&self, kind: PillarKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    /// Set the weight of `kind`.
    pub fn set(&mut self, kind: PillarKind, weight: f64) {
        self.0.insert(kind, weight);
    }

    /// Builder-style [`Self::set`].
    pub fn with(mut self, kind: PillarKind, weight: f64) -> Self {
        self.set(kind, weight);
        self
    }

    /// Iterate configured weights in pillar order.
    pub fn iter(&self) -> impl Iterator<Item = (PillarKind, f64)> + '_ {
        self.0.iter().map(|(k, w)| (*k, *w))
    }

    /// Sum of all configured weights.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// Reject negative or non-finite weights and an all-zero vector.
    pub fn validate(&self) -> Result<(), CompositeError> {
        for (kind, weight) in self.iter() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(CompositeError::InvalidWeight {
                    pillar: kind.to_string(),
                    weight,
                });
            }
        }
        if self.total() <= 0.0 {
            return Err(CompositeError::ZeroTotalWeight);
        }
        Ok(())
    }
}

impl FromIterator<(PillarKind, f64)> for PillarWeights {
    fn from_iter<I: IntoIterator<Item = (PillarKind, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
