//! Testing utilities and mock implementations.
//!
//! This module provides a mock `ScoringService` so the whole job lifecycle
//! can be exercised without a running scoring service.
//!
//! # Example
//!
//! ```rust,ignore
//! use examscore_core::testing::{fixtures, MockScoringService};
//!
//! let service = Arc::new(MockScoringService::new());
//! service.push_upload_session("s1").await;
//! service.set_results("s1", fixtures::sample_results()).await;
//!
//! let orchestrator = JobOrchestrator::new(service.clone(), &PollingConfig::default());
//! ```

mod mock_service;

pub use mock_service::{MockScoringService, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use crate::analysis::{
        DifficultyLevel, ItemDifficulties, ItemDifficulty, Results, ScoreSummary,
    };
    use crate::selection::SelectedFile;

    /// A small spreadsheet selection with a valid MIME type.
    pub fn spreadsheet(name: &str) -> SelectedFile {
        SelectedFile {
            name: name.to_string(),
            mime_type: crate::selection::mime_type_for(name)
                .unwrap_or("application/octet-stream")
                .to_string(),
            data: b"PK\x03\x04mock-workbook".to_vec(),
        }
    }

    /// Results for a 5-question exam taken by 4 students.
    pub fn sample_results() -> Results {
        results_with(&[-1.1, -0.3, 0.2, 0.7, 1.4])
    }

    /// Results whose items have the given difficulties.
    pub fn results_with(difficulties: &[f64]) -> Results {
        let n = difficulties.len().max(1) as f64;
        let mean = difficulties.iter().sum::<f64>() / n;
        let std = (difficulties.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n).sqrt();
        let (min, max) = if difficulties.is_empty() {
            (0.0, 0.0)
        } else {
            (
                difficulties.iter().copied().fold(f64::INFINITY, f64::min),
                difficulties.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        let mut grade_distribution = BTreeMap::new();
        grade_distribution.insert("A".to_string(), 1);
        grade_distribution.insert("B".to_string(), 2);
        grade_distribution.insert("C".to_string(), 1);

        Results {
            summary: ScoreSummary {
                total_students: 4,
                total_questions: difficulties.len() as u32,
                grade_distribution,
                average_score: 68.5,
                highest_score: 92.0,
                lowest_score: 41.0,
                std_deviation: Some(18.2),
            },
            item_difficulties: ItemDifficulties {
                min,
                max,
                mean,
                std,
                items: difficulties
                    .iter()
                    .enumerate()
                    .map(|(i, &difficulty)| ItemDifficulty {
                        question: format!("Savol {}", i + 1),
                        difficulty,
                        level: DifficultyLevel::from_difficulty(difficulty),
                    })
                    .collect(),
            },
        }
    }
}
