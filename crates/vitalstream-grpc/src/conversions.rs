//! Proto <-> domain mapping for the three RPC surfaces.

use chrono::{DateTime, SecondsFormat, Utc};

use vitalstream_domain::events::{AnomalyScores, OverallRiskScore, VitalScore};
use vitalstream_domain::measurement::{VitalMetric, VitalSample, VitalUnit, Vitals};
use vitalstream_domain::registry::{
    BloodPressureRange, Device, DeviceStatus, Patient, Sex, ThresholdProfile, VitalRange,
};
use vitalstream_domain::severity::AnomalySeverity;
use vitalstream_proto::anomaly::v1 as anomaly_proto;
use vitalstream_proto::registry::v1 as registry_proto;

pub fn wire_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_wire_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// --- registry ---

pub fn device_to_proto(device: Device) -> registry_proto::Device {
    registry_proto::Device {
        device_id: device.device_id,
        device_type: device.device_type,
        patient_id: device.patient_id.unwrap_or_default(),
        status: match device.status {
            DeviceStatus::Active => registry_proto::DeviceStatus::Active,
            DeviceStatus::Inactive => registry_proto::DeviceStatus::Inactive,
            DeviceStatus::Decommissioned => registry_proto::DeviceStatus::Decommissioned,
        } as i32,
        metadata: device.metadata,
    }
}

pub fn proto_to_device(device: registry_proto::Device) -> Device {
    let status = registry_proto::DeviceStatus::try_from(device.status)
        .unwrap_or(registry_proto::DeviceStatus::Unspecified);
    Device {
        device_id: device.device_id,
        device_type: device.device_type,
        patient_id: if device.patient_id.is_empty() {
            None
        } else {
            Some(device.patient_id)
        },
        status: match status {
            registry_proto::DeviceStatus::Inactive => DeviceStatus::Inactive,
            registry_proto::DeviceStatus::Decommissioned => DeviceStatus::Decommissioned,
            _ => DeviceStatus::Active,
        },
        metadata: device.metadata,
    }
}

pub fn patient_to_proto(patient: Patient) -> registry_proto::Patient {
    registry_proto::Patient {
        patient_id: patient.patient_id,
        age: patient.age,
        gender: match patient.sex {
            Sex::Male => registry_proto::Gender::Male,
            Sex::Female => registry_proto::Gender::Female,
            Sex::Other => registry_proto::Gender::Other,
            Sex::Unknown => registry_proto::Gender::Unknown,
        } as i32,
        medical_conditions: patient.medical_conditions,
        medications: patient.medications,
        allergies: patient.allergies,
    }
}

pub fn proto_to_patient(patient: registry_proto::Patient) -> Patient {
    let gender = registry_proto::Gender::try_from(patient.gender)
        .unwrap_or(registry_proto::Gender::Unspecified);
    Patient {
        patient_id: patient.patient_id,
        age: patient.age,
        sex: match gender {
            registry_proto::Gender::Male => Sex::Male,
            registry_proto::Gender::Female => Sex::Female,
            registry_proto::Gender::Other => Sex::Other,
            _ => Sex::Unknown,
        },
        medical_conditions: patient.medical_conditions,
        medications: patient.medications,
        allergies: patient.allergies,
    }
}

fn range_to_proto(range: VitalRange) -> registry_proto::VitalRange {
    registry_proto::VitalRange {
        min: range.min,
        max: range.max,
    }
}

fn proto_to_range(range: Option<registry_proto::VitalRange>) -> VitalRange {
    range
        .map(|r| VitalRange::new(r.min, r.max))
        .unwrap_or(VitalRange::new(0.0, 0.0))
}

pub fn threshold_profile_to_proto(profile: ThresholdProfile) -> registry_proto::ThresholdProfile {
    registry_proto::ThresholdProfile {
        patient_id: profile.patient_id,
        device_id: profile.device_id.unwrap_or_default(),
        heart_rate: Some(range_to_proto(profile.heart_rate)),
        blood_pressure: Some(registry_proto::BloodPressureRange {
            systolic: Some(range_to_proto(profile.blood_pressure.systolic)),
            diastolic: Some(range_to_proto(profile.blood_pressure.diastolic)),
        }),
        temperature: Some(range_to_proto(profile.temperature)),
        oxygen_saturation: Some(range_to_proto(profile.oxygen_saturation)),
        respiratory_rate: Some(range_to_proto(profile.respiratory_rate)),
    }
}

pub fn proto_to_threshold_profile(profile: registry_proto::ThresholdProfile) -> ThresholdProfile {
    let blood_pressure = profile.blood_pressure.unwrap_or_default();
    ThresholdProfile {
        patient_id: profile.patient_id,
        device_id: if profile.device_id.is_empty() {
            None
        } else {
            Some(profile.device_id)
        },
        heart_rate: proto_to_range(profile.heart_rate),
        blood_pressure: BloodPressureRange {
            systolic: proto_to_range(blood_pressure.systolic),
            diastolic: proto_to_range(blood_pressure.diastolic),
        },
        temperature: proto_to_range(profile.temperature),
        oxygen_saturation: proto_to_range(profile.oxygen_saturation),
        respiratory_rate: proto_to_range(profile.respiratory_rate),
    }
}

// --- anomaly ---

fn unit_to_wire(unit: VitalUnit) -> &'static str {
    match unit {
        VitalUnit::Bpm => "bpm",
        VitalUnit::Percent => "percent",
        VitalUnit::Celsius => "celsius",
        VitalUnit::Fahrenheit => "fahrenheit",
    }
}

fn sample_to_proto(sample: &VitalSample) -> anomaly_proto::VitalSign {
    anomaly_proto::VitalSign {
        value: sample.value,
        unit: unit_to_wire(sample.unit).to_string(),
        timestamp: wire_timestamp(sample.timestamp),
    }
}

fn proto_to_sample(metric: VitalMetric, sign: anomaly_proto::VitalSign) -> VitalSample {
    VitalSample {
        value: sign.value,
        unit: VitalUnit::resolve(metric, &sign.unit),
        timestamp: parse_wire_timestamp(&sign.timestamp),
    }
}

pub fn vitals_to_proto(vitals: &Vitals) -> anomaly_proto::VitalSigns {
    anomaly_proto::VitalSigns {
        heart_rate: vitals.heart_rate.as_ref().map(sample_to_proto),
        oxygen_saturation: vitals.oxygen_saturation.as_ref().map(sample_to_proto),
        temperature: vitals.temperature.as_ref().map(sample_to_proto),
    }
}

pub fn proto_to_vitals(signs: anomaly_proto::VitalSigns) -> Vitals {
    Vitals {
        heart_rate: signs
            .heart_rate
            .map(|s| proto_to_sample(VitalMetric::HeartRate, s)),
        oxygen_saturation: signs
            .oxygen_saturation
            .map(|s| proto_to_sample(VitalMetric::OxygenSaturation, s)),
        temperature: signs
            .temperature
            .map(|s| proto_to_sample(VitalMetric::Temperature, s)),
    }
}

pub fn severity_to_proto(severity: AnomalySeverity) -> anomaly_proto::Severity {
    match severity {
        AnomalySeverity::Normal => anomaly_proto::Severity::Normal,
        AnomalySeverity::Low => anomaly_proto::Severity::Low,
        AnomalySeverity::Medium => anomaly_proto::Severity::Medium,
        AnomalySeverity::High => anomaly_proto::Severity::High,
        AnomalySeverity::Critical => anomaly_proto::Severity::Critical,
    }
}

pub fn proto_to_severity(severity: i32) -> AnomalySeverity {
    match anomaly_proto::Severity::try_from(severity) {
        Ok(anomaly_proto::Severity::Low) => AnomalySeverity::Low,
        Ok(anomaly_proto::Severity::Medium) => AnomalySeverity::Medium,
        Ok(anomaly_proto::Severity::High) => AnomalySeverity::High,
        Ok(anomaly_proto::Severity::Critical) => AnomalySeverity::Critical,
        _ => AnomalySeverity::Normal,
    }
}

fn score_to_proto(score: &VitalScore) -> anomaly_proto::VitalScore {
    anomaly_proto::VitalScore {
        score: score.score,
        severity: severity_to_proto(score.severity) as i32,
        explanation: score.explanation.clone().unwrap_or_default(),
    }
}

fn proto_to_score(score: anomaly_proto::VitalScore) -> VitalScore {
    VitalScore {
        score: score.score,
        severity: proto_to_severity(score.severity),
        explanation: if score.explanation.is_empty() {
            None
        } else {
            Some(score.explanation)
        },
    }
}

pub fn anomaly_scores_to_proto(scores: &AnomalyScores) -> anomaly_proto::AnomalyScores {
    anomaly_proto::AnomalyScores {
        heart_rate: scores.heart_rate.as_ref().map(score_to_proto),
        oxygen_saturation: scores.oxygen_saturation.as_ref().map(score_to_proto),
        temperature: scores.temperature.as_ref().map(score_to_proto),
    }
}

pub fn proto_to_anomaly_scores(scores: anomaly_proto::AnomalyScores) -> AnomalyScores {
    AnomalyScores {
        heart_rate: scores.heart_rate.map(proto_to_score),
        oxygen_saturation: scores.oxygen_saturation.map(proto_to_score),
        temperature: scores.temperature.map(proto_to_score),
    }
}

pub fn overall_risk_to_proto(risk: &OverallRiskScore) -> anomaly_proto::OverallRiskScore {
    anomaly_proto::OverallRiskScore {
        score: risk.score,
        severity: severity_to_proto(risk.severity) as i32,
        aggregation_method: risk.aggregation_method.clone(),
    }
}

pub fn proto_to_overall_risk(risk: anomaly_proto::OverallRiskScore) -> OverallRiskScore {
    OverallRiskScore {
        score: risk.score,
        severity: proto_to_severity(risk.severity),
        aggregation_method: risk.aggregation_method,
    }
}
