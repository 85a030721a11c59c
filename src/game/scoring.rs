use serde::{Deserialize, Serialize};

/// Points awarded for a single answer.
///
/// A server runs with exactly one rule; the two are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScoringRule {
    /// Fixed award for a correct answer, nothing otherwise.
    Flat { points: u32 },
    /// Correct answers earn `max_points` scaled down linearly with the time
    /// taken, reaching zero at `time_limit_secs`.
    TimeWeighted { max_points: u32, time_limit_secs: f64 },
}

impl Default for ScoringRule {
    fn default() -> Self {
        ScoringRule::Flat { points: 100 }
    }
}

impl ScoringRule {
    pub fn points(&self, is_correct: bool, elapsed_secs: Option<f64>) -> u32 {
        if !is_correct {
            return 0;
        }

        match *self {
            ScoringRule::Flat { points } => points,
            ScoringRule::TimeWeighted {
                max_points,
                time_limit_secs,
            } => {
                if time_limit_secs <= 0.0 {
                    return 0;
                }
                // Missing or nonsensical timings count as an instant answer
                let elapsed = elapsed_secs
                    .filter(|t| t.is_finite() && *t >= 0.0)
                    .unwrap_or(0.0);
                let factor = (1.0 - elapsed / time_limit_secs).max(0.0);
                (f64::from(max_points) * factor).floor() as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, None, 100)]
    #[case(true, Some(29.0), 100)]
    #[case(false, Some(1.0), 0)]
    #[case(false, None, 0)]
    fn test_flat_scoring(#[case] correct: bool, #[case] elapsed: Option<f64>, #[case] expected: u32) {
        let rule = ScoringRule::default();
        assert_eq!(rule.points(correct, elapsed), expected);
    }

    #[rstest]
    #[case(true, Some(0.0), 1000)]
    #[case(true, Some(15.0), 500)]
    #[case(true, Some(7.5), 750)]
    #[case(true, Some(30.0), 0)]
    #[case(true, Some(45.0), 0)] // late answers never go negative
    #[case(true, Some(-3.0), 1000)]
    #[case(true, None, 1000)]
    #[case(false, Some(0.0), 0)]
    fn test_time_weighted_scoring(
        #[case] correct: bool,
        #[case] elapsed: Option<f64>,
        #[case] expected: u32,
    ) {
        let rule = ScoringRule::TimeWeighted {
            max_points: 1000,
            time_limit_secs: 30.0,
        };
        assert_eq!(rule.points(correct, elapsed), expected);
    }

    #[test]
    fn test_time_weighted_with_zero_limit_awards_nothing() {
        let rule = ScoringRule::TimeWeighted {
            max_points: 1000,
            time_limit_secs: 0.0,
        };
        assert_eq!(rule.points(true, Some(0.0)), 0);
    }
}
