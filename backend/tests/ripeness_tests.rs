//! Ripeness forecasting property-based and unit tests
//!
//! Tests for:
//! - Property 1: Ripeness Percentages Sum to 100 (or 0)
//! - Property 2: Unknown Detections Never Shift the Buckets
//! - Property 3: Velocity Baseline Always Moves
//! - Property 4: Harvest Time Projection
//! - Property 5: Environmental Setpoints Stay Within Reference Conditions

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::{
    calculate_harvest_time, environmental_setpoints, estimate_harvest_date,
    validate_ripeness_percentages, CategoryResult, Detection, ForecastError, RipenessCategory,
    RipenessPercentages, VelocityState, DEFAULT_CLASS_NAMES, DEFAULT_STABILITY_THRESHOLD,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

/// Generate a detection with a label from the detector vocabulary
fn known_detection_strategy() -> impl Strategy<Value = Detection> {
    (0..DEFAULT_CLASS_NAMES.len(), 0.0..=1.0f64)
        .prop_map(|(idx, confidence)| Detection::new(DEFAULT_CLASS_NAMES[idx], confidence))
}

/// Generate a detection with a label outside the vocabulary
fn unknown_detection_strategy() -> impl Strategy<Value = Detection> {
    ("[a-z]{3,12}", 0.0..=1.0f64)
        .prop_filter("label must be unknown", |(label, _)| {
            !DEFAULT_CLASS_NAMES.contains(&label.as_str())
        })
        .prop_map(|(label, confidence)| Detection::new(label, confidence))
}

/// Generate a batch of detections (possibly empty)
fn detection_batch_strategy() -> impl Strategy<Value = Vec<Detection>> {
    prop::collection::vec(known_detection_strategy(), 0..200)
}

/// Generate a ripe percentage (0 to 100, 2 decimals)
fn ripe_percentage_strategy() -> impl Strategy<Value = f64> {
    (0..=10_000u32).prop_map(|n| f64::from(n) / 100.0)
}

/// Generate a positive growth speed (0.1 to 20 percent per day)
fn growth_speed_strategy() -> impl Strategy<Value = f64> {
    (1..=200u32).prop_map(|n| f64::from(n) / 10.0)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_empty_batch_has_zero_percentages() {
    let result = CategoryResult::from_detections(&Vec::<Detection>::new());
    assert!(result.is_empty());
    assert_eq!(result.percentages(), RipenessPercentages::default());
}

#[test]
fn test_average_confidence_rounded_to_four_places() {
    let detections = vec![
        Detection::new("b_green", 0.91234),
        Detection::new("l_green", 0.5),
        Detection::new("l_green", 0.6),
    ];
    let result = CategoryResult::from_detections(&detections);
    let unripe = result.get(RipenessCategory::Unripe);
    assert_eq!(unripe.count, 3);
    assert_eq!(unripe.average_confidence, 0.6708);
}

#[test]
fn test_reference_velocity_sequence() {
    let mut state = VelocityState::new();
    let readings: Vec<(f64, bool)> = [40.0, 55.0, 58.0]
        .iter()
        .map(|ripe| {
            let r = state.track(*ripe, DEFAULT_STABILITY_THRESHOLD);
            (r.velocity, r.stable)
        })
        .collect();
    assert_eq!(readings, vec![(0.0, true), (15.0, false), (3.0, true)]);
}

#[test]
fn test_reference_harvest_time() {
    assert_eq!(calculate_harvest_time(50.0, 5.0), Ok(7.0));
    assert_eq!(
        calculate_harvest_time(50.0, 0.0),
        Err(ForecastError::InvalidGrowthSpeed(0.0))
    );
}

#[test]
fn test_all_unripe_reference_setpoints() {
    let setpoints = environmental_setpoints(&RipenessPercentages::from_counts(12, 0, 0));
    assert_eq!(setpoints.temperature_setpoint, 20.0);
    assert_eq!(setpoints.light_intensity_setpoint, 7000.0);
    assert_eq!(setpoints.humidity_setpoint, 90.0);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Property 1: percentages of any batch sum to 0 or 100 (up to rounding)
    #[test]
    fn prop_percentages_sum_to_hundred(batch in detection_batch_strategy()) {
        let percentages = CategoryResult::from_detections(&batch).percentages();
        let total = percentages.total();

        prop_assert!(total == 0.0 || (total - 100.0).abs() <= 0.02, "total = {}", total);
        prop_assert!(validate_ripeness_percentages(&percentages).is_ok());
        for category in RipenessCategory::BUCKETS {
            prop_assert!((0.0..=100.0).contains(&percentages.get(category)));
        }
    }

    /// Property 1b: counts are preserved by aggregation
    #[test]
    fn prop_counts_match_batch_size(batch in detection_batch_strategy()) {
        let result = CategoryResult::from_detections(&batch);
        prop_assert_eq!(result.bucket_total(), batch.len() as u64);
    }

    /// Property 2: unknown detections are counted but do not change percentages
    #[test]
    fn prop_unknown_detections_ignored(
        batch in detection_batch_strategy(),
        unknown in prop::collection::vec(unknown_detection_strategy(), 1..20),
    ) {
        let baseline = CategoryResult::from_detections(&batch).percentages();

        let mut mixed = batch.clone();
        mixed.extend(unknown.iter().cloned());
        let result = CategoryResult::from_detections(&mixed);

        prop_assert_eq!(result.percentages(), baseline);
        prop_assert_eq!(result.count(RipenessCategory::Unknown) as usize, unknown.len());
    }

    /// Property 3: velocity is the plain delta and the baseline always moves
    #[test]
    fn prop_velocity_is_delta(
        sequence in prop::collection::vec(ripe_percentage_strategy(), 1..30),
    ) {
        let mut state = VelocityState::new();
        let mut previous: Option<f64> = None;

        for ripe in sequence {
            let reading = state.track(ripe, DEFAULT_STABILITY_THRESHOLD);
            let expected = previous.map_or(0.0, |p| ripe - p);

            prop_assert_eq!(reading.velocity, expected);
            prop_assert_eq!(reading.stable, expected.abs() <= DEFAULT_STABILITY_THRESHOLD);
            prop_assert_eq!(state.previous_ripeness, Some(ripe));
            previous = Some(ripe);
        }
    }

    /// Property 4: more ripe fruit never means a later harvest
    #[test]
    fn prop_harvest_time_decreases_with_ripeness(
        a in ripe_percentage_strategy(),
        b in ripe_percentage_strategy(),
        growth in growth_speed_strategy(),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let later = calculate_harvest_time(low, growth).unwrap();
        let sooner = calculate_harvest_time(high, growth).unwrap();
        prop_assert!(sooner <= later);
    }

    /// Property 4b: non-positive growth speed is always rejected
    #[test]
    fn prop_non_positive_growth_rejected(
        ripe in ripe_percentage_strategy(),
        growth in -100.0..=0.0f64,
    ) {
        prop_assert!(calculate_harvest_time(ripe, growth).is_err());
    }

    /// Property 4c: the estimated harvest date is never in the past
    #[test]
    fn prop_estimated_date_not_before_today(
        ripe in ripe_percentage_strategy(),
        growth in growth_speed_strategy(),
    ) {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let days = calculate_harvest_time(ripe, growth).unwrap();
        let date = estimate_harvest_date(today, days).unwrap();
        prop_assert!(date >= today);
    }

    /// Property 5: setpoints of a non-empty batch blend the reference conditions
    #[test]
    fn prop_setpoints_within_reference_range(
        counts in (0..500u32, 0..500u32, 0..500u32)
            .prop_filter("batch must not be empty", |(u, h, r)| u + h + r > 0),
    ) {
        let percentages = RipenessPercentages::from_counts(counts.0, counts.1, counts.2);
        let setpoints = environmental_setpoints(&percentages);

        prop_assert!((19.9..=24.1).contains(&setpoints.temperature_setpoint));
        prop_assert!((2990.0..=7010.0).contains(&setpoints.light_intensity_setpoint));
        prop_assert!((72.4..=90.1).contains(&setpoints.humidity_setpoint));
    }
}
