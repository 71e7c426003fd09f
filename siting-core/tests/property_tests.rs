//! Property-based tests for normalisation, weighting and pagination.
//!
//! # Invariants tested
//!
//! - **Range:** every sub-score lies in `[0, 100]` for finite input.
//! - **Monotonicity:** sub-scores move in the factor's preferred direction.
//! - **Saturation:** inputs at or beyond a bound score exactly 0 or 100.
//! - **Snapshot totals:** a record's total equals the rounded dot product of
//!   its sub-scores and its stored weights.
//! - **Pagination:** a page is the matching slice of the full result.

use proptest::prelude::*;
use siting_core::test_support::{FixedClock, sample_row, sample_site};
use siting_core::{
    Factor, Page, SiteQuery, WeightVector, execute_query, normalize_area, normalize_grid,
    normalize_infra, normalize_slope, normalize_solar, score_site,
};

fn factor_strategy() -> impl Strategy<Value = Factor> {
    prop::sample::select(Factor::ALL.to_vec())
}

/// Raw values spanning well past every curve's knots.
fn raw_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![0.0..10.0_f64, 0.0..100_000.0_f64]
}

fn higher_is_better(factor: Factor) -> bool {
    matches!(factor, Factor::SolarIrradiance | Factor::Area)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn sub_scores_stay_in_range(factor in factor_strategy(), raw in raw_strategy()) {
        let score = factor.normalize(raw);
        prop_assert!((0.0..=100.0).contains(&score), "{factor:?}({raw}) = {score}");
    }

    #[test]
    fn sub_scores_are_monotonic(
        factor in factor_strategy(),
        a in raw_strategy(),
        b in raw_strategy(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let (at_low, at_high) = (factor.normalize(low), factor.normalize(high));
        if higher_is_better(factor) {
            prop_assert!(at_low <= at_high);
        } else {
            prop_assert!(at_low >= at_high);
        }
    }

    #[test]
    fn bounds_saturate(excess in 0.0..1_000.0_f64) {
        prop_assert_eq!(normalize_solar(5.5 + excess), 100.0);
        prop_assert_eq!(normalize_solar(3.0 - excess.min(3.0)), 0.0);
        prop_assert_eq!(normalize_area(50_000.0 + excess), 100.0);
        prop_assert_eq!(normalize_area(5_000.0 - excess), 0.0);
        prop_assert_eq!(normalize_grid(1.0 - excess.min(1.0)), 100.0);
        prop_assert_eq!(normalize_grid(20.0 + excess), 0.0);
        prop_assert_eq!(normalize_slope(5.0 - excess.min(5.0)), 100.0);
        prop_assert_eq!(normalize_slope(20.0 + excess), 0.0);
        prop_assert_eq!(normalize_infra(0.5 - excess.min(0.5)), 100.0);
        prop_assert_eq!(normalize_infra(5.0 + excess), 0.0);
    }

    #[test]
    fn interior_values_are_strictly_between(t in 0.01..0.99_f64) {
        for score in [
            normalize_solar(3.0 + 2.5 * t),
            normalize_area(5_000.0 + 45_000.0 * t),
            normalize_grid(1.0 + 19.0 * t),
            normalize_slope(5.0 + 15.0 * t),
            normalize_infra(0.5 + 4.5 * t),
        ] {
            prop_assert!(score > 0.0 && score < 100.0, "interior score {score}");
        }
    }

    #[test]
    fn totals_match_stored_snapshot(site_id in 1_i64..500) {
        let weights = WeightVector::new(0.40, 0.30, 0.15, 0.10, 0.05)
            .expect("weights sum to one");
        let record = score_site(&sample_site(site_id), &weights, &FixedClock::default())
            .expect("sample sites score");
        prop_assert_eq!(record.total_score, record.recompute_total());
        prop_assert!((0.0..=100.0).contains(&record.total_score));
    }

    #[test]
    fn pages_are_slices_of_the_full_result(offset in 0_usize..30, limit in 0_usize..30) {
        let rows: Vec<_> = (1..=25).map(sample_row).collect();
        let full = execute_query(rows.clone(), &SiteQuery::default());
        let paged = execute_query(
            rows,
            &SiteQuery {
                page: Page { offset, limit: Some(limit) },
                ..SiteQuery::default()
            },
        );
        let expected: Vec<_> = full.rows.iter().skip(offset).take(limit).cloned().collect();
        prop_assert_eq!(paged.rows, expected);
        prop_assert_eq!(paged.total_count, full.total_count);
    }
}
