//! Synthetic composite series over a set of features.

use std::collections::BTreeMap;

use foundation::ids::FeatureRef;
use foundation::series::ForecastSeries;
use serde::Serialize;

use crate::statistics::Statistics;

/// One feature's contribution to an aggregate.
#[derive(Debug, Clone, Copy)]
pub struct Member<'a> {
    pub feature: &'a FeatureRef,
    /// `None` while the detail is pending or confirmed empty.
    pub series: Option<&'a ForecastSeries>,
    pub totals: Option<&'a BTreeMap<String, f64>>,
}

impl<'a> Member<'a> {
    pub fn new(feature: &'a FeatureRef, series: Option<&'a ForecastSeries>) -> Self {
        Self {
            feature,
            series,
            totals: None,
        }
    }

    pub fn with_totals(mut self, totals: Option<&'a BTreeMap<String, f64>>) -> Self {
        self.totals = totals;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub series: ForecastSeries,
    /// Members that contributed a series, in input order.
    pub members: Vec<FeatureRef>,
    /// Additive properties summed across members.
    pub totals: BTreeMap<String, f64>,
}

/// Index-aligned mean over the members' series.
///
/// The shape follows the first member with a non-empty series; each position
/// averages the members holding a finite value there. Returns `None` when no
/// member has a series yet.
pub fn aggregate(members: &[Member<'_>]) -> Option<Aggregate> {
    let contributing: Vec<(&FeatureRef, &ForecastSeries)> = members
        .iter()
        .filter_map(|m| m.series.filter(|s| !s.is_empty()).map(|s| (m.feature, s)))
        .collect();
    let (_, base) = contributing.first()?;

    let series: Vec<&ForecastSeries> = contributing.iter().map(|(_, s)| *s).collect();
    let years = base.years.clone();
    let n = years.len();
    let out = ForecastSeries {
        years,
        p10: mean_column(&series, n, |s| &s.p10),
        p50: mean_column(&series, n, |s| &s.p50),
        p90: mean_column(&series, n, |s| &s.p90),
        median: mean_column(&series, n, |s| &s.median),
        historical: mean_column(&series, n, |s| &s.historical),
    };

    let mut totals = BTreeMap::new();
    for totals_of in members.iter().filter_map(|m| m.totals) {
        for (name, value) in totals_of {
            if value.is_finite() {
                *totals.entry(name.clone()).or_insert(0.0) += value;
            }
        }
    }

    Some(Aggregate {
        series: out,
        members: contributing.iter().map(|(f, _)| (*f).clone()).collect(),
        totals,
    })
}

/// Aggregate of the selection plus one would-be member.
///
/// `None` unless shift is held and the candidate is not already selected.
pub fn preview(
    selection: &[Member<'_>],
    candidate: Member<'_>,
    shift_held: bool,
) -> Option<Aggregate> {
    if !shift_held || selection.iter().any(|m| m.feature == candidate.feature) {
        return None;
    }
    let mut members = selection.to_vec();
    members.push(candidate);
    aggregate(&members)
}

fn mean_column(
    series: &[&ForecastSeries],
    n: usize,
    column: impl Fn(&ForecastSeries) -> &Vec<f64>,
) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let values: Vec<f64> = series.iter().filter_map(|s| column(s).get(i).copied()).collect();
            Statistics::mean(&values).unwrap_or(f64::NAN)
        })
        .collect()
}
