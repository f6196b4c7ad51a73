use serde::{Deserialize, Serialize};

/// Alert severity lattice. Derived ordering follows declaration order, so
/// `Ok < Low < Medium < Warning < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Low,
    Medium,
    Warning,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "ok",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

/// Severity bands produced by the anomaly scorer, monotone in score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Normal,
    Low,
    Medium,
    High,
    Critical,
}

impl AnomalySeverity {
    /// Band for an anomaly score in `[0, 1]`.
    pub fn from_score(score: f64) -> AnomalySeverity {
        if score < 0.2 {
            AnomalySeverity::Normal
        } else if score < 0.4 {
            AnomalySeverity::Low
        } else if score < 0.6 {
            AnomalySeverity::Medium
        } else if score < 0.8 {
            AnomalySeverity::High
        } else {
            AnomalySeverity::Critical
        }
    }
}

/// Scorer bands fold into the alert lattice with `medium` landing on
/// `warning`, which subsumes it when aggregating with rule severities.
impl From<AnomalySeverity> for Severity {
    fn from(value: AnomalySeverity) -> Self {
        match value {
            AnomalySeverity::Normal => Severity::Ok,
            AnomalySeverity::Low => Severity::Low,
            AnomalySeverity::Medium => Severity::Warning,
            AnomalySeverity::High => Severity::High,
            AnomalySeverity::Critical => Severity::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_matches_lattice() {
        assert!(Severity::Ok < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::Warning);
        assert!(Severity::Warning < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn anomaly_bands_are_monotone_in_score() {
        let scores = [0.0, 0.1, 0.2, 0.39, 0.4, 0.59, 0.6, 0.79, 0.8, 1.0];
        let mut last = AnomalySeverity::Normal;
        for score in scores {
            let band = AnomalySeverity::from_score(score);
            assert!(band >= last, "band regressed at score {score}");
            last = band;
        }
        assert_eq!(AnomalySeverity::from_score(0.0), AnomalySeverity::Normal);
        assert_eq!(AnomalySeverity::from_score(0.5), AnomalySeverity::Medium);
        assert_eq!(AnomalySeverity::from_score(1.0), AnomalySeverity::Critical);
    }

    #[test]
    fn anomaly_medium_folds_into_warning() {
        assert_eq!(Severity::from(AnomalySeverity::Normal), Severity::Ok);
        assert_eq!(Severity::from(AnomalySeverity::Medium), Severity::Warning);
        assert_eq!(Severity::from(AnomalySeverity::Critical), Severity::Critical);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Severity::Warning).unwrap(), "warning");
        assert_eq!(serde_json::to_value(AnomalySeverity::Normal).unwrap(), "normal");
    }
}
