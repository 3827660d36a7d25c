//! Input catalog
//!
//! A [`Catalog`] describes, for every pillar, the components it is built from
//! and, for every component, which raw inputs feed it and how they are
//! aligned, combined, transformed and normalized.

use aibps_core::{
    AlignPolicy, AlignSpec, ColumnSelector, Frequency, Normalization, PillarAggregator,
    PillarKind, Transform,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How the inputs of a multi-input component are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Transform and normalize each input, then take the row mean
    #[default]
    MeanNormalized,
    /// Row mean of the aligned inputs, then transform and normalize
    MeanRaw,
    /// Row sum of the aligned inputs, then transform and normalize
    SumRaw,
}

/// Recipe of one normalized component column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecipe {
    /// Output column name
    pub name: String,
    /// Source identifiers
    pub inputs: Vec<String>,
    /// Alignment of every input
    pub align: AlignSpec,
    /// Combination of several inputs
    #[serde(default)]
    pub combine: CombineMode,
    /// Transforms applied in order before normalization
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<Transform>,
    /// Normalization of the transformed series
    pub normalization: Normalization,
}

impl ComponentRecipe {
    /// A component without transforms.
    pub fn new<I, S>(
        name: impl Into<String>,
        inputs: I,
        align: AlignSpec,
        normalization: Normalization,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            align,
            combine: CombineMode::default(),
            transforms: Vec::new(),
            normalization,
        }
    }

    /// Set the combine mode.
    pub fn combine(mut self, mode: CombineMode) -> Self {
        self.combine = mode;
        self
    }

    /// Append a transform.
    pub fn transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }
}

/// Recipe of one pillar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PillarRecipe {
    /// Pillar produced
    pub kind: PillarKind,
    /// Which component columns feed the pillar
    #[serde(default)]
    pub selector: ColumnSelector,
    /// Components, in output column order
    pub components: Vec<ComponentRecipe>,
}

impl PillarRecipe {
    /// Create a pillar recipe.
    pub const fn new(
        kind: PillarKind,
        selector: ColumnSelector,
        components: Vec<ComponentRecipe>,
    ) -> Self {
        Self {
            kind,
            selector,
            components,
        }
    }

    /// Aggregator for this pillar.
    pub fn aggregator(&self) -> PillarAggregator {
        PillarAggregator::new(self.kind, self.selector.clone())
    }

    /// Source identifiers used by this pillar, in recipe order.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.components
            .iter()
            .flat_map(|c| c.inputs.iter().map(String::as_str))
    }
}

/// The full set of pillar recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    pillars: Vec<PillarRecipe>,
}

impl Catalog {
    /// Catalog from explicit recipes.
    pub const fn new(pillars: Vec<PillarRecipe>) -> Self {
        Self { pillars }
    }

    /// Parse a catalog from a JSON array of pillar recipes.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Pillar recipes in run order.
    pub fn pillars(&self) -> &[PillarRecipe] {
        &self.pillars
    }

    /// Recipe for `kind`.
    pub fn pillar(&self, kind: PillarKind) -> Option<&PillarRecipe> {
        self.pillars.iter().find(|p| p.kind == kind)
    }

    /// Every distinct source identifier, sorted.
    pub fn inputs(&self) -> Vec<&str> {
        self.pillars
            .iter()
            .flat_map(PillarRecipe::inputs)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of pillar recipes.
    pub const fn len(&self) -> usize {
        self.pillars.len()
    }

    /// Whether the catalog has no recipes.
    pub const fn is_empty(&self) -> bool {
        self.pillars.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            market(),
            capex_supply(),
            infra(),
            adoption(),
            credit(),
            sentiment(),
        ])
    }
}

const DAILY: AlignSpec = AlignSpec::new(Frequency::Daily);
const MONTHLY: AlignSpec = AlignSpec::new(Frequency::Monthly);
const QUARTERLY: AlignSpec = AlignSpec::new(Frequency::Quarterly);

fn market() -> PillarRecipe {
    let yoy = |ticker: &str| {
        ComponentRecipe::new(
            format!("MKT_{ticker}_1y_pct"),
            [ticker],
            DAILY,
            Normalization::percentile(false),
        )
        .transform(Transform::YOY)
    };
    PillarRecipe::new(
        PillarKind::Market,
        ColumnSelector::prefix("MKT_"),
        vec![yoy("SOXX"), yoy("QQQ")],
    )
}

fn credit() -> PillarRecipe {
    // Tighter spreads mean more pressure
    let spread = |name: &str, id: &str| {
        ComponentRecipe::new(name, [id], DAILY, Normalization::percentile(true))
    };
    PillarRecipe::new(
        PillarKind::Credit,
        ColumnSelector::suffix("OAS_pct"),
        vec![
            spread("HY_OAS_pct", "BAMLH0A0HYM2"),
            spread("IG_OAS_pct", "BAMLCC0A0CM"),
        ],
    )
}

fn capex_supply() -> PillarRecipe {
    PillarRecipe::new(
        PillarKind::CapexSupply,
        ColumnSelector::prefix("Capex_Supply"),
        vec![
            ComponentRecipe::new(
                "Capex_Supply_Macro",
                ["PNFI"],
                QUARTERLY,
                Normalization::percentile(false),
            )
            .transform(Transform::YOY)
            .transform(Transform::RollingMean { window: 3 }),
            ComponentRecipe::new(
                "Capex_Supply_Manual",
                ["CAPEX_MANUAL"],
                MONTHLY,
                Normalization::percentile(false),
            ),
        ],
    )
}

fn rebased(name: &str, inputs: &[&str]) -> ComponentRecipe {
    ComponentRecipe::new(name, inputs.iter().copied(), MONTHLY, Normalization::Rebase)
}

fn infra() -> PillarRecipe {
    PillarRecipe::new(
        PillarKind::Infra,
        ColumnSelector::prefix("Infra_"),
        vec![
            rebased("Infra_Power_Grid", &["IPG2211A2N", "IPUTIL"]),
            ComponentRecipe::new(
                "Infra_Construction",
                ["PNFI", "PRFI"],
                QUARTERLY,
                Normalization::Rebase,
            ),
            rebased("Infra_Semi_Equip", &["IPG336413", "IPN336413"]),
            rebased("Infra_Materials", &["IPN331111", "PCOPPUSDM"]),
            ComponentRecipe::new(
                "Infra_Macro",
                ["PRPWRCONS", "PRCMUCONS"],
                MONTHLY,
                Normalization::percentile(false),
            )
            .combine(CombineMode::SumRaw),
        ],
    )
}

fn adoption() -> PillarRecipe {
    PillarRecipe::new(
        PillarKind::Adoption,
        ColumnSelector::prefix("Adoption_"),
        vec![
            ComponentRecipe::new(
                "Adoption_Enterprise_Software",
                ["A652RX1Q020SBEA", "A747RX1Q020SBEA"],
                QUARTERLY,
                Normalization::Rebase,
            ),
            rebased("Adoption_Cloud_Services", &["IPG51A2N", "IPN518", "IPN541"]),
            rebased("Adoption_Digital_Labor", &["CES5000000001", "CES6000000001"]),
            rebased("Adoption_Connectivity", &["IPN3342", "IPN5171"]),
        ],
    )
}

/// Search terms tracked by the sentiment pillar.
pub const SENTIMENT_TERMS: [&str; 5] = [
    "trends_artificial_intelligence",
    "trends_chatgpt",
    "trends_openai",
    "trends_generative_ai",
    "trends_machine_learning",
];

fn sentiment() -> PillarRecipe {
    PillarRecipe::new(
        PillarKind::Sentiment,
        ColumnSelector::prefix("Sentiment"),
        vec![
            ComponentRecipe::new(
                "Sentiment_Hype",
                SENTIMENT_TERMS,
                AlignSpec::with_policy(Frequency::Weekly, AlignPolicy::Mean),
                Normalization::percentile(false),
            )
            .combine(CombineMode::MeanRaw),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_covers_every_pillar() {
        let catalog = Catalog::default();
        assert_eq!(catalog.len(), PillarKind::ALL.len());
        for kind in PillarKind::ALL {
            assert!(catalog.pillar(kind).is_some(), "missing recipe for {kind}");
        }
    }

    #[rstest]
    #[case(PillarKind::Market, &["MKT_SOXX_1y_pct", "MKT_QQQ_1y_pct"])]
    #[case(PillarKind::Credit, &["HY_OAS_pct", "IG_OAS_pct"])]
    #[case(PillarKind::CapexSupply, &["Capex_Supply_Macro", "Capex_Supply_Manual"])]
    #[case(PillarKind::Sentiment, &["Sentiment_Hype"])]
    fn test_component_names_match_selector(
        #[case] kind: PillarKind,
        #[case] expected: &[&str],
    ) {
        let recipe = Catalog::default().pillar(kind).cloned().unwrap();
        let names: Vec<&str> = recipe.components.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, expected);
        for name in names {
            assert!(recipe.selector.matches(name), "{name} not selected by {kind}");
        }
    }

    #[test]
    fn test_inputs_are_distinct() {
        let catalog = Catalog::default();
        let inputs = catalog.inputs();
        // PNFI feeds both Capex_Supply and Infra
        assert_eq!(inputs.iter().filter(|id| **id == "PNFI").count(), 1);
        assert!(inputs.contains(&"BAMLH0A0HYM2"));
        assert!(inputs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_credit_is_inverted() {
        let catalog = Catalog::default();
        let credit = catalog.pillar(PillarKind::Credit).unwrap();
        assert!(credit.components.iter().all(|c| matches!(
            c.normalization,
            Normalization::Percentile { invert: true, .. }
        )));
    }

    #[test]
    fn test_json_roundtrip() {
        let catalog = Catalog::default();
        let json = serde_json::to_string(&catalog).unwrap();
        assert_eq!(Catalog::from_json(&json).unwrap(), catalog);
    }

    #[test]
    fn test_custom_recipe_from_json() {
        let catalog = Catalog::from_json(
            r#"[{
                "kind": "Market",
                "selector": {"prefix": "MKT_"},
                "components": [{
                    "name": "MKT_SPY_1y_pct",
                    "inputs": ["SPY"],
                    "align": {"frequency": "daily"},
                    "transforms": [{"kind": "pct_change", "periods": 12}],
                    "normalization": {"method": "percentile"}
                }]
            }]"#,
        )
        .unwrap();
        let market = catalog.pillar(PillarKind::Market).unwrap();
        assert_eq!(market.inputs().collect::<Vec<_>>(), vec!["SPY"]);
        assert_eq!(market.components[0].combine, CombineMode::MeanNormalized);
        assert_eq!(market.components[0].transforms, vec![Transform::YOY]);
    }
}
