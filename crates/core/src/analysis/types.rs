//! Result payload produced by the scoring service for one analysis.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Final computed metrics for a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    /// Aggregate statistics over all test-takers.
    pub summary: ScoreSummary,
    /// Per-item difficulty distribution.
    pub item_difficulties: ItemDifficulties,
}

/// Aggregate statistics over all test-takers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    /// Number of test-takers.
    pub total_students: u32,
    /// Number of items (questions).
    pub total_questions: u32,
    /// Grade label -> number of test-takers with that grade.
    pub grade_distribution: BTreeMap<String, u32>,
    pub average_score: f64,
    pub highest_score: f64,
    pub lowest_score: f64,
    /// Standard deviation of the scores (not sent by every service version).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_deviation: Option<f64>,
}

/// Difficulty distribution plus the ordered per-item records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDifficulties {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub items: Vec<ItemDifficulty>,
}

/// Difficulty record for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDifficulty {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Difficulty")]
    pub difficulty: f64,
    #[serde(rename = "Difficulty_Level")]
    pub level: DifficultyLevel,
}

/// Categorical difficulty of an item.
///
/// The service labels levels in Uzbek (`Oson`, `O'rta`, `Qiyin`); the English
/// names are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    #[serde(alias = "Oson", alias = "Easy")]
    Easy,
    #[serde(alias = "O'rta", alias = "Medium")]
    Medium,
    #[serde(alias = "Qiyin", alias = "Hard")]
    Hard,
}

impl DifficultyLevel {
    /// Classify a difficulty value the way the scoring service does.
    pub fn from_difficulty(difficulty: f64) -> Self {
        if difficulty < -0.5 {
            DifficultyLevel::Easy
        } else if difficulty < 0.5 {
            DifficultyLevel::Medium
        } else {
            DifficultyLevel::Hard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Easy => "easy",
            DifficultyLevel::Medium => "medium",
            DifficultyLevel::Hard => "hard",
        }
    }
}

impl ItemDifficulties {
    /// Number of items per difficulty level (levels with no items are omitted).
    pub fn count_by_level(&self) -> BTreeMap<DifficultyLevel, usize> {
        let mut counts = BTreeMap::new();
        for item in &self.items {
            *counts.entry(item.level).or_insert(0) += 1;
        }
        counts
    }
}

impl Results {
    /// Check invariants serde cannot express.
    ///
    /// Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        let summary = &self.summary;
        for (name, value) in [
            ("summary.average_score", summary.average_score),
            ("summary.highest_score", summary.highest_score),
            ("summary.lowest_score", summary.lowest_score),
            ("item_difficulties.min", self.item_difficulties.min),
            ("item_difficulties.max", self.item_difficulties.max),
            ("item_difficulties.mean", self.item_difficulties.mean),
            ("item_difficulties.std", self.item_difficulties.std),
        ] {
            if !value.is_finite() {
                return Err(format!("{} is not a finite number", name));
            }
        }

        if summary.lowest_score > summary.highest_score {
            return Err(format!(
                "summary.lowest_score ({}) exceeds summary.highest_score ({})",
                summary.lowest_score, summary.highest_score
            ));
        }

        if let Some(item) = self
            .item_difficulties
            .items
            .iter()
            .find(|i| !i.difficulty.is_finite())
        {
            return Err(format!("difficulty of {} is not a finite number", item.question));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_json() -> serde_json::Value {
        json!({
            "summary": {
                "total_students": 3,
                "total_questions": 2,
                "grade_distribution": {"A": 1, "B": 2},
                "average_score": 61.5,
                "highest_score": 80.0,
                "lowest_score": 40.0,
                "std_deviation": 16.4
            },
            "item_difficulties": {
                "min": -0.8,
                "max": 0.9,
                "mean": 0.05,
                "std": 0.85,
                "items": [
                    {"Question": "Savol 1", "Difficulty": -0.8, "Difficulty_Level": "Oson"},
                    {"Question": "Savol 2", "Difficulty": 0.9, "Difficulty_Level": "Qiyin"}
                ]
            },
            "timestamp": "2024-01-01T10:00:00"
        })
    }

    #[test]
    fn test_deserialize_service_payload() {
        let results: Results = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(results.summary.total_students, 3);
        assert_eq!(results.summary.grade_distribution.len(), 2);
        assert_eq!(results.summary.std_deviation, Some(16.4));
        assert_eq!(results.item_difficulties.items[0].level, DifficultyLevel::Easy);
        assert_eq!(results.item_difficulties.items[1].level, DifficultyLevel::Hard);
        assert!(results.validate().is_ok());
    }

    #[test]
    fn test_deserialize_english_levels_and_missing_std_deviation() {
        let mut value = sample_json();
        value["summary"].as_object_mut().unwrap().remove("std_deviation");
        value["item_difficulties"]["items"][0]["Difficulty_Level"] = json!("medium");

        let results: Results = serde_json::from_value(value).unwrap();
        assert_eq!(results.summary.std_deviation, None);
        assert_eq!(results.item_difficulties.items[0].level, DifficultyLevel::Medium);
    }

    #[test]
    fn test_orta_label() {
        let level: DifficultyLevel = serde_json::from_str(r#""O'rta""#).unwrap();
        assert_eq!(level, DifficultyLevel::Medium);
    }

    #[test]
    fn test_reject_wrong_shape() {
        // The raw difficulty list some service versions send in place of the object.
        let mut value = sample_json();
        value["item_difficulties"] = json!([-0.8, 0.9]);
        assert!(serde_json::from_value::<Results>(value).is_err());
    }

    #[test]
    fn test_reject_unknown_level() {
        let mut value = sample_json();
        value["item_difficulties"]["items"][0]["Difficulty_Level"] = json!("trivial");
        assert!(serde_json::from_value::<Results>(value).is_err());
    }

    #[test]
    fn test_from_difficulty_thresholds() {
        assert_eq!(DifficultyLevel::from_difficulty(-1.2), DifficultyLevel::Easy);
        assert_eq!(DifficultyLevel::from_difficulty(-0.5), DifficultyLevel::Medium);
        assert_eq!(DifficultyLevel::from_difficulty(0.49), DifficultyLevel::Medium);
        assert_eq!(DifficultyLevel::from_difficulty(0.5), DifficultyLevel::Hard);
    }

    #[test]
    fn test_count_by_level() {
        let results: Results = serde_json::from_value(sample_json()).unwrap();
        let counts = results.item_difficulties.count_by_level();
        assert_eq!(counts.get(&DifficultyLevel::Easy), Some(&1));
        assert_eq!(counts.get(&DifficultyLevel::Hard), Some(&1));
        assert_eq!(counts.get(&DifficultyLevel::Medium), None);
    }

    #[test]
    fn test_validate_inverted_scores() {
        let mut results: Results = serde_json::from_value(sample_json()).unwrap();
        results.summary.lowest_score = 95.0;
        assert!(results.validate().is_err());
    }
}
