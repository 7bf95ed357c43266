//! Document lifecycle status derived from quality scores.

use contentcurator_shared::{ContentStatus, QualityDimensions};

/// Average at or above which a document meets its targets.
pub const MEETS_TARGETS_THRESHOLD: f64 = 8.5;

/// Average at or above which a document is worth improving rather than re-reviewing.
pub const NEEDS_IMPROVEMENT_THRESHOLD: f64 = 7.0;

/// Derive the status of a document from its current scores.
///
/// Pure and total: every score set maps to exactly one status, monotonic in
/// the average score.
pub fn determine_status(scores: &QualityDimensions) -> ContentStatus {
    // Round away float noise so an exact 8.5 average is not read as 8.4999...
    let average = (scores.average() * 1e9).round() / 1e9;

    if average >= MEETS_TARGETS_THRESHOLD {
        ContentStatus::MeetsTargets
    } else if average >= NEEDS_IMPROVEMENT_THRESHOLD {
        ContentStatus::NeedsImprovement
    } else {
        ContentStatus::NeedsReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_boundaries() {
        assert_eq!(
            determine_status(&QualityDimensions::uniform(7.0)),
            ContentStatus::NeedsImprovement
        );
        assert_eq!(
            determine_status(&QualityDimensions::uniform(8.499)),
            ContentStatus::NeedsImprovement
        );
        assert_eq!(
            determine_status(&QualityDimensions::uniform(8.5)),
            ContentStatus::MeetsTargets
        );
        assert_eq!(
            determine_status(&QualityDimensions::uniform(6.999)),
            ContentStatus::NeedsReview
        );
    }

    #[test]
    fn mixed_scores_use_the_average() {
        // 9 + 9 + 8 + 8.5 + 8 = 42.5, average 8.5
        let scores = QualityDimensions {
            readability: 9.0,
            seo: 9.0,
            technical_accuracy: 8.0,
            engagement: 8.5,
            content_depth: 8.0,
        };
        assert_eq!(determine_status(&scores), ContentStatus::MeetsTargets);
    }

    #[test]
    fn zero_scores_need_review() {
        assert_eq!(
            determine_status(&QualityDimensions::default()),
            ContentStatus::NeedsReview
        );
    }

    #[test]
    fn monotonic_in_average() {
        let rank = |s: ContentStatus| match s {
            ContentStatus::NeedsReview => 0,
            ContentStatus::NeedsImprovement => 1,
            ContentStatus::MeetsTargets => 2,
        };
        let mut previous = 0;
        for step in 0..=1000 {
            let score = step as f64 / 100.0;
            let current = rank(determine_status(&QualityDimensions::uniform(score)));
            assert!(current >= previous, "status regressed at {score}");
            previous = current;
        }
        assert_eq!(previous, 2);
    }
}
