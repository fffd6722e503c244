use serde::{Deserialize, Serialize};

/// Minimum score counted as a pass
pub const PASS_THRESHOLD: f64 = 7.0;

/// Score delta below which two averages are treated as unchanged
pub const TREND_THRESHOLD: f64 = 0.5;

/// Summary statistics over a batch of validation scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateScore {
    /// Mean of usable scores, rounded to one decimal
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    /// 0-10, penalizes spread; rounded to one decimal
    pub consistency: f64,
    /// Percentage of usable scores >= 7
    pub pass_rate: f64,
    /// Number of usable scores
    pub scored: usize,
    /// Number of scores supplied, usable or not
    pub total: usize,
}

impl AggregateScore {
    /// Change in average relative to an earlier run
    pub fn improvement_over(&self, previous: Option<f64>) -> Option<f64> {
        previous
            .filter(|p| *p > 0.0)
            .map(|p| round1(self.average_score - p))
    }

    pub fn trend(&self, previous: Option<f64>) -> ScoreTrend {
        ScoreTrend::between(self.average_score, previous)
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.average_score)
    }

    pub fn consistency_label(&self) -> &'static str {
        if self.consistency >= 8.0 {
            "Highly consistent"
        } else if self.consistency >= 6.0 {
            "Moderately consistent"
        } else {
            "Needs improvement"
        }
    }

    pub fn pass_rate_label(&self) -> &'static str {
        if self.pass_rate >= 80.0 {
            "Excellent!"
        } else if self.pass_rate >= 60.0 {
            "Good"
        } else {
            "Needs work"
        }
    }
}

/// Aggregate a batch of scores.
///
/// Only scores above zero count; zero and below mean "no score". Returns
/// `None` when nothing usable remains.
///
/// Consistency is `max(0, 10 - stddev * 2)`: a population standard
/// deviation of 5 collapses it to 0. It is a bounded heuristic for display,
/// not a statistical measure.
pub fn aggregate<I>(scores: I) -> Option<AggregateScore>
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0;
    let valid: Vec<f64> = scores
        .into_iter()
        .inspect(|_| total += 1)
        .filter(|s| *s > 0.0)
        .collect();

    if valid.is_empty() {
        return None;
    }

    let count = valid.len() as f64;
    let mean = valid.iter().sum::<f64>() / count;
    let min_score = valid.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = valid.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let variance = valid.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / count;
    let consistency = (10.0 - variance.sqrt() * 2.0).max(0.0);
    let passed = valid.iter().filter(|s| **s >= PASS_THRESHOLD).count() as f64;

    Some(AggregateScore {
        average_score: round1(mean),
        min_score,
        max_score,
        consistency: round1(consistency),
        pass_rate: passed / count * 100.0,
        scored: valid.len(),
        total,
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Direction of the average score across iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTrend {
    Up,
    Down,
    Same,
}

impl ScoreTrend {
    pub fn between(current: f64, previous: Option<f64>) -> Self {
        let Some(previous) = previous.filter(|p| *p != 0.0) else {
            return ScoreTrend::Same;
        };
        let diff = current - previous;
        if diff > TREND_THRESHOLD {
            ScoreTrend::Up
        } else if diff < -TREND_THRESHOLD {
            ScoreTrend::Down
        } else {
            ScoreTrend::Same
        }
    }
}

/// Qualitative bucket for an average score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// 8-10: minor tweaks may help
    Excellent,
    /// 6-7.9
    Good,
    /// 4-5.9: review the analysis carefully
    NeedsWork,
    /// Below 4
    MajorRevision,
}

impl ScoreBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            ScoreBand::Excellent
        } else if score >= 6.0 {
            ScoreBand::Good
        } else if score >= 4.0 {
            ScoreBand::NeedsWork
        } else {
            ScoreBand::MajorRevision
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent - Minor tweaks may help",
            ScoreBand::Good => "Good - Some improvements needed",
            ScoreBand::NeedsWork => "Needs work - Review analysis carefully",
            ScoreBand::MajorRevision => "Major revision required",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_none() {
        assert_eq!(aggregate(Vec::<f64>::new()), None);
    }

    #[test]
    fn test_all_sentinels_is_none() {
        assert_eq!(aggregate([0.0, 0.0, 0.0]), None);
    }

    #[test]
    fn test_two_scores() {
        let agg = aggregate([8.0, 6.0]).unwrap();
        assert_eq!(agg.average_score, 7.0);
        assert_eq!(agg.min_score, 6.0);
        assert_eq!(agg.max_score, 8.0);
        assert_eq!(agg.pass_rate, 50.0);
        assert_eq!(agg.consistency, 8.0);
        assert_eq!(agg.scored, 2);
    }

    #[test]
    fn test_single_score_saturates_consistency() {
        let agg = aggregate([7.0]).unwrap();
        assert_eq!(agg.consistency, 10.0);
        assert_eq!(agg.pass_rate, 100.0);
    }

    #[test]
    fn test_batch_of_three() {
        let agg = aggregate([9.0, 7.0, 3.0]).unwrap();
        assert_eq!(agg.average_score, 6.3);
        assert_eq!(agg.min_score, 3.0);
        assert_eq!(agg.max_score, 9.0);
        assert!((agg.pass_rate - 66.7).abs() < 0.05);
        // stddev of [9, 7, 3] around 6.333 is ~2.494
        assert_eq!(agg.consistency, 5.0);
    }

    #[test]
    fn test_sentinels_are_excluded_not_averaged() {
        let agg = aggregate([0.0, 8.0, 0.0]).unwrap();
        assert_eq!(agg.average_score, 8.0);
        assert_eq!(agg.min_score, 8.0);
        assert_eq!(agg.scored, 1);
        assert_eq!(agg.total, 3);
    }

    #[test]
    fn test_consistency_floors_at_zero() {
        let agg = aggregate([1.0, 10.0, 1.0, 10.0]).unwrap();
        // stddev 4.5 -> 10 - 9 = 1.0
        assert_eq!(agg.consistency, 1.0);

        let agg = aggregate([0.5, 20.0]).unwrap();
        assert_eq!(agg.consistency, 0.0);
    }

    #[test]
    fn test_variance_uses_unrounded_mean() {
        // mean 7.25 rounds to 7.3 for display; spread is computed from 7.25
        let agg = aggregate([7.0, 7.5]).unwrap();
        assert_eq!(agg.average_score, 7.3);
        assert_eq!(agg.consistency, 9.5);
    }

    #[test]
    fn test_trend() {
        assert_eq!(ScoreTrend::between(7.0, None), ScoreTrend::Same);
        assert_eq!(ScoreTrend::between(7.0, Some(0.0)), ScoreTrend::Same);
        assert_eq!(ScoreTrend::between(7.0, Some(6.0)), ScoreTrend::Up);
        assert_eq!(ScoreTrend::between(7.0, Some(7.4)), ScoreTrend::Same);
        assert_eq!(ScoreTrend::between(6.0, Some(7.0)), ScoreTrend::Down);
    }

    #[test]
    fn test_improvement_over() {
        let agg = aggregate([8.0, 6.0]).unwrap();
        assert_eq!(agg.improvement_over(Some(5.5)), Some(1.5));
        assert_eq!(agg.improvement_over(None), None);
        assert_eq!(agg.trend(Some(5.5)), ScoreTrend::Up);
    }

    #[test]
    fn test_bands_and_labels() {
        assert_eq!(ScoreBand::from_score(8.0), ScoreBand::Excellent);
        assert_eq!(ScoreBand::from_score(7.9), ScoreBand::Good);
        assert_eq!(ScoreBand::from_score(4.0), ScoreBand::NeedsWork);
        assert_eq!(ScoreBand::from_score(3.9), ScoreBand::MajorRevision);

        let agg = aggregate([9.0, 9.0]).unwrap();
        assert_eq!(agg.consistency_label(), "Highly consistent");
        assert_eq!(agg.pass_rate_label(), "Excellent!");
    }
}
