use serde::{Deserialize, Serialize};

use crate::measurement::Vitals;
use crate::registry::ThresholdProfile;
use crate::severity::Severity;

/// Constants for the combined rule, independent of per-patient profiles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleConstants {
    pub hr_very_high: f64,
    pub spo2_low: f64,
}

impl Default for RuleConstants {
    fn default() -> Self {
        Self {
            hr_very_high: 120.0,
            spo2_low: 90.0,
        }
    }
}

/// One triggered rule with the observation that breached it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleResult {
    pub rule_id: &'static str,
    pub severity: Severity,
    pub metric: &'static str,
    pub observed: f64,
    pub threshold: f64,
    pub message: String,
}

/// Evaluates the fixed rule set against the vitals actually present.
///
/// Temperature comparisons happen on the Celsius scale: the profile bounds
/// are Celsius and a Fahrenheit reading is converted for the comparison only;
/// the event itself keeps its declared unit.
pub fn evaluate_rules(
    vitals: &Vitals,
    profile: &ThresholdProfile,
    constants: &RuleConstants,
) -> Vec<RuleResult> {
    let mut triggered = Vec::new();

    let hr = vitals.heart_rate.as_ref().map(|s| s.value);
    let spo2 = vitals.oxygen_saturation.as_ref().map(|s| s.value);
    let temp_c = vitals.temperature.as_ref().map(|s| s.value_in_celsius());

    if let Some(hr) = hr {
        if hr > profile.heart_rate.max {
            triggered.push(RuleResult {
                rule_id: "hr_max_exceeded",
                severity: Severity::Warning,
                metric: "heart_rate",
                observed: hr,
                threshold: profile.heart_rate.max,
                message: format!(
                    "Heart rate {hr} exceeds maximum threshold {}",
                    profile.heart_rate.max
                ),
            });
        }
    }

    if let Some(spo2) = spo2 {
        if spo2 < profile.oxygen_saturation.min {
            triggered.push(RuleResult {
                rule_id: "spo2_min_below",
                severity: Severity::Critical,
                metric: "oxygen_saturation",
                observed: spo2,
                threshold: profile.oxygen_saturation.min,
                message: format!(
                    "SpO2 {spo2} below minimum threshold {}",
                    profile.oxygen_saturation.min
                ),
            });
        }
    }

    if let Some(temp_c) = temp_c {
        if temp_c > profile.temperature.max {
            triggered.push(RuleResult {
                rule_id: "temp_max_exceeded",
                severity: Severity::Warning,
                metric: "temperature",
                observed: temp_c,
                threshold: profile.temperature.max,
                message: format!(
                    "Temperature {temp_c:.1}C exceeds maximum threshold {}C",
                    profile.temperature.max
                ),
            });
        }
    }

    if let (Some(hr), Some(spo2)) = (hr, spo2) {
        if hr > constants.hr_very_high && spo2 < constants.spo2_low {
            triggered.push(RuleResult {
                rule_id: "hr_high_spo2_low_combined",
                severity: Severity::Critical,
                metric: "heart_rate",
                observed: hr,
                threshold: constants.hr_very_high,
                message: format!(
                    "Critical combination: heart rate {hr} above {} with SpO2 {spo2} below {}",
                    constants.hr_very_high, constants.spo2_low
                ),
            });
        }
    }

    triggered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{VitalMetric, VitalSample, VitalUnit};
    use crate::registry::{BloodPressureRange, VitalRange};
    use chrono::Utc;

    fn profile() -> ThresholdProfile {
        ThresholdProfile {
            patient_id: "P1".to_string(),
            device_id: None,
            heart_rate: VitalRange::new(60.0, 100.0),
            blood_pressure: BloodPressureRange {
                systolic: VitalRange::new(90.0, 140.0),
                diastolic: VitalRange::new(60.0, 90.0),
            },
            temperature: VitalRange::new(36.0, 37.5),
            oxygen_saturation: VitalRange::new(95.0, 100.0),
            respiratory_rate: VitalRange::new(12.0, 20.0),
        }
    }

    fn vitals(hr: Option<f64>, spo2: Option<f64>, temp: Option<(f64, VitalUnit)>) -> Vitals {
        let mut v = Vitals::default();
        let ts = Utc::now();
        if let Some(hr) = hr {
            v.insert(VitalMetric::HeartRate, VitalSample { value: hr, unit: VitalUnit::Bpm, timestamp: ts });
        }
        if let Some(spo2) = spo2 {
            v.insert(
                VitalMetric::OxygenSaturation,
                VitalSample { value: spo2, unit: VitalUnit::Percent, timestamp: ts },
            );
        }
        if let Some((value, unit)) = temp {
            v.insert(VitalMetric::Temperature, VitalSample { value, unit, timestamp: ts });
        }
        v
    }

    #[test]
    fn nominal_vitals_trigger_nothing() {
        let triggered = evaluate_rules(
            &vitals(Some(72.0), Some(98.0), Some((37.0, VitalUnit::Celsius))),
            &profile(),
            &RuleConstants::default(),
        );
        assert!(triggered.is_empty());
    }

    #[test]
    fn high_heart_rate_is_warning() {
        let triggered = evaluate_rules(
            &vitals(Some(110.0), None, None),
            &profile(),
            &RuleConstants::default(),
        );
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].rule_id, "hr_max_exceeded");
        assert_eq!(triggered[0].severity, Severity::Warning);
        assert_eq!(triggered[0].observed, 110.0);
        assert_eq!(triggered[0].threshold, 100.0);
    }

    #[test]
    fn low_spo2_is_critical() {
        let triggered = evaluate_rules(
            &vitals(None, Some(92.0), None),
            &profile(),
            &RuleConstants::default(),
        );
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].rule_id, "spo2_min_below");
        assert_eq!(triggered[0].severity, Severity::Critical);
    }

    #[test]
    fn combined_breach_triggers_three_rules() {
        let triggered = evaluate_rules(
            &vitals(Some(130.0), Some(88.0), None),
            &profile(),
            &RuleConstants::default(),
        );
        let ids: Vec<&str> = triggered.iter().map(|r| r.rule_id).collect();
        assert_eq!(
            ids,
            vec!["hr_max_exceeded", "spo2_min_below", "hr_high_spo2_low_combined"]
        );
    }

    #[test]
    fn fahrenheit_temperature_compares_on_celsius_scale() {
        // 101.3F ~ 38.5C, above the 37.5C profile max.
        let triggered = evaluate_rules(
            &vitals(None, None, Some((101.3, VitalUnit::Fahrenheit))),
            &profile(),
            &RuleConstants::default(),
        );
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].rule_id, "temp_max_exceeded");

        // 98.6F = 37.0C stays inside the window despite 98.6 > 37.5.
        let calm = evaluate_rules(
            &vitals(None, None, Some((98.6, VitalUnit::Fahrenheit))),
            &profile(),
            &RuleConstants::default(),
        );
        assert!(calm.is_empty());
    }

    #[test]
    fn rules_skip_absent_vitals() {
        let triggered = evaluate_rules(&Vitals::default(), &profile(), &RuleConstants::default());
        assert!(triggered.is_empty());
    }

    #[test]
    fn combined_rule_requires_both_conditions() {
        let only_hr = evaluate_rules(
            &vitals(Some(130.0), Some(95.0), None),
            &profile(),
            &RuleConstants::default(),
        );
        assert!(only_hr.iter().all(|r| r.rule_id != "hr_high_spo2_low_combined"));
    }
}
