//! Validation utilities for the Harvesta platform

use crate::models::{RipenessCategory, RipenessPercentages};

// ============================================================================
// Ripeness Validations
// ============================================================================

/// Validate a single percentage is within 0-100
pub fn validate_percentage(value: f64) -> Result<(), &'static str> {
    if !value.is_finite() {
        return Err("Percentage must be a finite number");
    }
    if !(0.0..=100.0).contains(&value) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate bucket percentages are in range and sum to 100 (or are all zero)
pub fn validate_ripeness_percentages(percentages: &RipenessPercentages) -> Result<(), &'static str> {
    for category in RipenessCategory::BUCKETS {
        validate_percentage(percentages.get(category))?;
    }

    let total = percentages.total();
    // each bucket is rounded to 2 decimals, so allow the accumulated rounding error
    if total != 0.0 && (total - 100.0).abs() > 0.02 {
        return Err("Ripeness percentages must sum to 100");
    }
    Ok(())
}

/// Validate detector confidence is within 0-1
pub fn validate_confidence(confidence: f64) -> Result<(), &'static str> {
    if !(0.0..=1.0).contains(&confidence) {
        return Err("Confidence must be between 0 and 1");
    }
    Ok(())
}

// ============================================================================
// Forecast Validations
// ============================================================================

/// Validate growth speed (ripe percent per day) can drive a forecast
pub fn validate_growth_speed(growth_speed: f64) -> Result<(), &'static str> {
    if !growth_speed.is_finite() || growth_speed <= 0.0 {
        return Err("Growth speed must be greater than 0");
    }
    Ok(())
}

/// Validate the detector class vocabulary
pub fn validate_class_names(class_names: &[String]) -> Result<(), &'static str> {
    if class_names.len() < crate::ClassVocabulary::BUCKETED_CLASSES {
        return Err("Class names must list the six ripeness classes in model order");
    }
    if class_names.iter().any(|name| name.trim().is_empty()) {
        return Err("Class names must not be blank");
    }
    let mut seen = std::collections::HashSet::new();
    if !class_names.iter().all(|name| seen.insert(name.as_str())) {
        return Err("Class names must be unique");
    }
    Ok(())
}
