//! Ripeness classification and batch aggregation

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::rounding::{round2, round4};

/// Detections below this confidence never reach aggregation
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Class vocabulary of the tomato detector, in model index order
pub const DEFAULT_CLASS_NAMES: [&str; 6] = [
    "b_fully_ripened",
    "b_half_ripened",
    "b_green",
    "l_fully_ripened",
    "l_half_ripened",
    "l_green",
];

/// Coarse ripeness bucket a detection is grouped into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RipenessCategory {
    Unripe,
    HalfRipe,
    Ripe,
    /// Label outside the detector vocabulary; never part of the percentages
    Unknown,
}

impl RipenessCategory {
    /// The three buckets that make up the ripeness percentages
    pub const BUCKETS: [RipenessCategory; 3] = [
        RipenessCategory::Unripe,
        RipenessCategory::HalfRipe,
        RipenessCategory::Ripe,
    ];

    /// Map a detector class label onto its bucket
    pub fn from_label(label: &str) -> Self {
        match label {
            "b_green" | "l_green" => RipenessCategory::Unripe,
            "b_half_ripened" | "l_half_ripened" => RipenessCategory::HalfRipe,
            "b_fully_ripened" | "l_fully_ripened" => RipenessCategory::Ripe,
            _ => RipenessCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RipenessCategory::Unripe => "unripe",
            RipenessCategory::HalfRipe => "half-ripe",
            RipenessCategory::Ripe => "ripe",
            RipenessCategory::Unknown => "unknown",
        }
    }

    pub fn is_bucket(&self) -> bool {
        !matches!(self, RipenessCategory::Unknown)
    }
}

impl std::fmt::Display for RipenessCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label to bucket table of a detector model.
///
/// Built from the class names in model index order: indices 0 and 3 are
/// ripe, 1 and 4 half-ripe, 2 and 5 unripe. Any further class is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassVocabulary {
    labels: HashMap<String, RipenessCategory>,
}

impl ClassVocabulary {
    /// Number of classes the bucket layout covers
    pub const BUCKETED_CLASSES: usize = 6;

    pub fn from_class_names<S: AsRef<str>>(class_names: &[S]) -> Self {
        let labels = class_names
            .iter()
            .enumerate()
            .map(|(index, name)| (name.as_ref().to_string(), Self::category_at(index)))
            .collect();
        Self { labels }
    }

    /// Bucket of the class at a model index
    pub fn category_at(index: usize) -> RipenessCategory {
        match index {
            0 | 3 => RipenessCategory::Ripe,
            1 | 4 => RipenessCategory::HalfRipe,
            2 | 5 => RipenessCategory::Unripe,
            _ => RipenessCategory::Unknown,
        }
    }

    pub fn category(&self, label: &str) -> RipenessCategory {
        self.labels
            .get(label)
            .copied()
            .unwrap_or(RipenessCategory::Unknown)
    }
}

impl Default for ClassVocabulary {
    fn default() -> Self {
        Self::from_class_names(&DEFAULT_CLASS_NAMES)
    }
}

/// One object found by the detector in one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_label: String,
    /// Detector confidence (0-1)
    pub confidence: f64,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f64) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
        }
    }

    pub fn category(&self) -> RipenessCategory {
        RipenessCategory::from_label(&self.class_label)
    }

    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Count and mean confidence of one category within a batch
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: u32,
    /// Mean detector confidence, rounded to 4 decimals (0 when empty)
    pub average_confidence: f64,
}

/// Per-category detection statistics for one image batch.
///
/// Only categories that received at least one detection are present, which is
/// also how the map is serialized (`{"ripe": {...}, "unripe": {...}}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryResult(BTreeMap<RipenessCategory, CategoryStats>);

impl CategoryResult {
    /// Group detections by category and compute count and mean confidence
    pub fn from_detections<'a, I>(detections: I) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        Self::group(detections, Detection::category)
    }

    /// Same as `from_detections`, mapping labels through a model vocabulary
    pub fn from_detections_in<'a, I>(vocabulary: &ClassVocabulary, detections: I) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        Self::group(detections, |d| vocabulary.category(&d.class_label))
    }

    fn group<'a, I, F>(detections: I, categorize: F) -> Self
    where
        I: IntoIterator<Item = &'a Detection>,
        F: Fn(&Detection) -> RipenessCategory,
    {
        let mut scores: BTreeMap<RipenessCategory, Vec<f64>> = BTreeMap::new();
        for detection in detections {
            scores
                .entry(categorize(detection))
                .or_default()
                .push(detection.confidence);
        }

        let stats = scores
            .into_iter()
            .map(|(category, confidences)| {
                let count = confidences.len() as u32;
                let average_confidence = if confidences.is_empty() {
                    0.0
                } else {
                    round4(confidences.iter().sum::<f64>() / confidences.len() as f64)
                };
                (
                    category,
                    CategoryStats {
                        count,
                        average_confidence,
                    },
                )
            })
            .collect();

        Self(stats)
    }

    /// Stats for a category, zeroed when nothing was detected
    pub fn get(&self, category: RipenessCategory) -> CategoryStats {
        self.0.get(&category).copied().unwrap_or_default()
    }

    pub fn count(&self, category: RipenessCategory) -> u32 {
        self.get(category).count
    }

    /// Detections across unripe, half-ripe and ripe (unknown excluded)
    pub fn bucket_total(&self) -> u64 {
        RipenessCategory::BUCKETS
            .iter()
            .map(|c| u64::from(self.count(*c)))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RipenessCategory, &CategoryStats)> {
        self.0.iter()
    }

    pub fn percentages(&self) -> RipenessPercentages {
        RipenessPercentages::from_counts(
            self.count(RipenessCategory::Unripe),
            self.count(RipenessCategory::HalfRipe),
            self.count(RipenessCategory::Ripe),
        )
    }
}

/// Share of each ripeness bucket in a batch, in percent (2 decimals)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RipenessPercentages {
    pub unripe: f64,
    #[serde(rename = "half-ripe")]
    pub half_ripe: f64,
    pub ripe: f64,
}

impl RipenessPercentages {
    pub fn new(unripe: f64, half_ripe: f64, ripe: f64) -> Self {
        Self {
            unripe,
            half_ripe,
            ripe,
        }
    }

    /// Normalize bucket counts to percentages; all zero when there is nothing to count
    pub fn from_counts(unripe: u32, half_ripe: u32, ripe: u32) -> Self {
        let total = u64::from(unripe) + u64::from(half_ripe) + u64::from(ripe);
        if total == 0 {
            return Self::default();
        }

        let share = |count: u32| round2(100.0 * f64::from(count) / total as f64);
        Self {
            unripe: share(unripe),
            half_ripe: share(half_ripe),
            ripe: share(ripe),
        }
    }

    pub fn get(&self, category: RipenessCategory) -> f64 {
        match category {
            RipenessCategory::Unripe => self.unripe,
            RipenessCategory::HalfRipe => self.half_ripe,
            RipenessCategory::Ripe => self.ripe,
            RipenessCategory::Unknown => 0.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.unripe + self.half_ripe + self.ripe
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0.0
    }
}

/// Drop detections below the confidence threshold
pub fn filter_confident(detections: Vec<Detection>, threshold: f64) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.meets_threshold(threshold))
        .collect()
}
