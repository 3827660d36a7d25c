//! End-to-end tests of the align, normalize, aggregate and composite stages.

use aibps_core::{
    AlignPolicy, AuditLog, ColumnSelector, CompositeBuilder, CompositeError, Condition, Frequency,
    Normalization, Normalizer, PercentileConfig, PillarAggregator, PillarKind, SeriesSet,
    TimeSeries, Transform, align,
};
use approx::assert_relative_eq;
use chrono::{Days, NaiveDate};

fn daily(name: &str, start: NaiveDate, days: u64, f: impl Fn(u64) -> f64) -> TimeSeries {
    TimeSeries::from_pairs(
        name,
        (0..days).filter_map(|d| start.checked_add_days(Days::new(d)).map(|date| (date, f(d)))),
    )
}

fn baseline() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 12, 31).unwrap()
}

#[test]
fn test_market_and_credit_pipeline() {
    let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
    let percentile = PercentileConfig::with_window(60);
    let mut audit = AuditLog::new();

    // Rising prices and oscillating spreads over four years
    let soxx = daily("SOXX", start, 1460, |d| 100.0 + d as f64 * 0.1);
    let hy = daily("BAMLH0A0HYM2", start, 1460, |d| 3.0 + (d as f64 / 90.0).sin());

    let market_component = {
        let aligned = align(&soxx, Frequency::Daily, AlignPolicy::Last);
        let yoy = Transform::YOY
            .apply(&aligned)
            .unwrap()
            .renamed("MKT_SOXX_1y_pct");
        Normalization::percentile(false)
            .build(&percentile, baseline())
            .unwrap()
            .normalize(&yoy, &mut audit)
            .unwrap()
    };
    let credit_component = {
        let aligned = align(&hy, Frequency::Daily, AlignPolicy::Last).renamed("HY_OAS_pct");
        Normalization::percentile(true)
            .build(&percentile, baseline())
            .unwrap()
            .normalize(&aligned, &mut audit)
            .unwrap()
    };

    let market = PillarAggregator::new(PillarKind::Market, ColumnSelector::prefix("MKT_"))
        .aggregate(&[market_component].into_iter().collect(), &mut audit)
        .unwrap();
    let credit = PillarAggregator::new(PillarKind::Credit, ColumnSelector::suffix("OAS_pct"))
        .aggregate(&[credit_component].into_iter().collect(), &mut audit)
        .unwrap();

    let index = CompositeBuilder::default()
        .build(&[market, credit], &mut audit)
        .unwrap();

    assert!(!index.is_empty());
    for (i, &score) in index.composite().iter().enumerate() {
        assert!((1.0..=99.0).contains(&score), "row {i} out of range: {score}");
        let weights = index.applied_weights(i).unwrap();
        assert_relative_eq!(weights.values().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
    assert_eq!(index.smoothed().len(), index.len());

    let latest = index.latest().unwrap();
    let market_latest = index.pillar(PillarKind::Market).unwrap()[latest];
    assert!(market_latest.is_some());

    // short history relative to the window was recorded
    assert!(audit
        .iter()
        .any(|c| matches!(c, Condition::InsufficientHistory { .. })));
}

#[test]
fn test_rebased_sub_pillars_feed_infra() {
    let mut audit = AuditLog::new();
    let start = NaiveDate::from_ymd_opt(2015, 10, 31).unwrap();
    let monthly = |name: &str, base: f64| {
        TimeSeries::from_pairs(
            name,
            (0..12).map(|m| {
                let date = start.checked_add_months(chrono::Months::new(m)).unwrap();
                (date, base + f64::from(m))
            }),
        )
    };

    let rebase = Normalization::Rebase
        .build(&PercentileConfig::default(), baseline())
        .unwrap();
    let components: SeriesSet = [
        monthly("Infra_Power_Grid", 50.0),
        monthly("Infra_Construction", 200.0),
    ]
    .iter()
    .map(|raw| {
        rebase
            .normalize(&align(raw, Frequency::Monthly, AlignPolicy::Last), &mut audit)
            .unwrap()
    })
    .collect();

    let infra = PillarAggregator::new(PillarKind::Infra, ColumnSelector::prefix("Infra_"))
        .aggregate(&components, &mut audit)
        .unwrap();

    // both sub-pillars equal 100 at the baseline, so the pillar does too
    assert_eq!(infra.series.get(baseline()), Some(100.0));
    assert!(audit.is_empty());
}

#[test]
fn test_nothing_available_is_fatal() {
    let mut audit = AuditLog::new();
    let empty = align(
        &TimeSeries::empty("SOXX"),
        Frequency::Daily,
        AlignPolicy::Last,
    );
    let market = PillarAggregator::new(PillarKind::Market, ColumnSelector::prefix("MKT_"))
        .aggregate(&[empty].into_iter().collect(), &mut audit);
    assert!(market.is_none());

    let result = CompositeBuilder::default().build(&[], &mut audit);
    assert!(matches!(result, Err(CompositeError::NoPillarsAvailable)));
    assert_eq!(audit.for_subject("Market").count(), 2);
}
