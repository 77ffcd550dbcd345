//! Aggregate reporting over contacts and interactions

use serde::{Deserialize, Serialize};

/// Counts served by the metrics endpoint
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Contacts ever seen
    pub total: u64,
    /// Interaction log entries
    pub responses: u64,
    pub supportive: u64,
    pub undecided: u64,
    pub opposed: u64,
    pub opted_out: u64,
    /// `responses / total` as a percentage, two decimals, 0 with no contacts
    pub response_rate: f64,
}

impl MetricsReport {
    pub fn from_counts(
        total: u64,
        responses: u64,
        supportive: u64,
        undecided: u64,
        opposed: u64,
        opted_out: u64,
    ) -> Self {
        Self {
            total,
            responses,
            supportive,
            undecided,
            opposed,
            opted_out,
            response_rate: response_rate(responses, total),
        }
    }
}

fn response_rate(responses: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let percent = responses as f64 / total as f64 * 100.0;
    (percent * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_is_zero_without_contacts() {
        let report = MetricsReport::from_counts(0, 5, 0, 0, 0, 0);
        assert_eq!(report.response_rate, 0.0);
    }

    #[test]
    fn test_rate_rounds_to_two_decimals() {
        assert_eq!(response_rate(1, 3), 33.33);
        assert_eq!(response_rate(2, 3), 66.67);
        assert_eq!(response_rate(7, 2), 350.0);
    }

    #[test]
    fn test_serialized_shape() {
        let report = MetricsReport::from_counts(4, 2, 1, 1, 1, 1);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["total"], 4);
        assert_eq!(value["opted_out"], 1);
        assert_eq!(value["response_rate"], 50.0);
    }
}
