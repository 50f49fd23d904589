//! Text summary builder for CLI output.
//!
//! Formats human-readable lines from analysis results for text mode.

use examscore_core::{DifficultyLevel, Results};

/// Build the text summary of `results`.
pub(crate) fn build_text_summary(results: &Results) -> Vec<String> {
    let summary = &results.summary;
    let items = &results.item_difficulties;
    let mut lines = Vec::new();

    lines.push(format!(
        "Students: {}  Questions: {}",
        summary.total_students, summary.total_questions
    ));
    let mut scores = format!(
        "Scores: avg {:.2} max {:.2} min {:.2}",
        summary.average_score, summary.highest_score, summary.lowest_score
    );
    if let Some(std) = summary.std_deviation {
        scores.push_str(&format!(" std {:.2}", std));
    }
    lines.push(scores);

    if !summary.grade_distribution.is_empty() {
        let grades: Vec<String> = summary
            .grade_distribution
            .iter()
            .map(|(grade, count)| format!("{grade}: {count}"))
            .collect();
        lines.push(format!("Grades: {}", grades.join(", ")));
    }

    lines.push(format!(
        "Difficulty: min {:.3} max {:.3} mean {:.3} std {:.3}",
        items.min, items.max, items.mean, items.std
    ));

    let counts = items.count_by_level();
    let count = |level: DifficultyLevel| counts.get(&level).copied().unwrap_or(0);
    lines.push(format!(
        "Items: {} easy, {} medium, {} hard",
        count(DifficultyLevel::Easy),
        count(DifficultyLevel::Medium),
        count(DifficultyLevel::Hard)
    ));

    for item in &items.items {
        lines.push(format!(
            "  {:<16} {:>7.3}  {}",
            item.question,
            item.difficulty,
            item.level.as_str()
        ));
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use examscore_core::testing::fixtures;

    #[test]
    fn test_summary_lines() {
        let lines = build_text_summary(&fixtures::sample_results());

        assert_eq!(lines[0], "Students: 4  Questions: 5");
        assert!(lines[1].starts_with("Scores: avg 68.50 max 92.00 min 41.00"));
        assert!(lines[1].ends_with("std 18.20"));
        assert_eq!(lines[2], "Grades: A: 1, B: 2, C: 1");
        assert_eq!(lines[4], "Items: 1 easy, 2 medium, 2 hard");
        assert_eq!(lines.len(), 5 + 5);
    }

    #[test]
    fn test_summary_without_optional_parts() {
        let mut results = fixtures::results_with(&[]);
        results.summary.std_deviation = None;
        results.summary.grade_distribution.clear();

        let lines = build_text_summary(&results);
        assert!(!lines[1].contains("std"));
        assert!(lines.iter().all(|l| !l.starts_with("Grades")));
        assert_eq!(lines.last().unwrap(), "Items: 0 easy, 0 medium, 0 hard");
    }
}
