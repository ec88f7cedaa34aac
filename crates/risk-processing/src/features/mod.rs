//! Feature engineering: derived columns, encoding and the feature schema.
//!
//! The engineer declares the [`FeatureSchema`] for the run and turns each
//! cleaned [`StudentRecord`] into a [`FeatureRow`] that conforms to it.

mod encoding;
pub mod formulas;

pub use encoding::{OneHotGroup, one_hot_groups};

use crate::error::{PipelineError, Result};
use crate::schema::{FeatureSchema, FeatureSpec};
use crate::types::{Dataset, FeatureRow, StudentRecord};
use formulas::*;
use tracing::{debug, info};

/// Raw continuous columns carried into the feature set unchanged.
pub const RAW_CONTINUOUS: [&str; 15] = [
    "AvgLoginFrequency",
    "TotalMissed",
    "TotalSubmitted",
    "AvgForumActivity",
    "AvgSessionDuration",
    "TotalDownloads",
    "TotalQuizAttempts",
    "GPA",
    "GPAChange",
    "CreditCompletion",
    "AvgAttendanceRate",
    "AvgLibraryVisits",
    "AvgDiningSwipes",
    "AvgLateNightSessions",
    "AvgRecreationUse",
];

/// Columns computed by formula rather than copied or encoded.
pub const ENGINEERED: [&str; 7] = [
    "EngagedBehaviourScore",
    "AssignmentCompletionRate",
    "LateNightRatio",
    "GPATier",
    "AcademicDeclineFlag",
    "SocialWithdrawalFlag",
    "DigitalDisengagementFlag",
];

/// Output of the feature engineering stage.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredData {
    pub dataset: Dataset,
    pub one_hot: Vec<OneHotGroup>,
}

impl EngineeredData {
    pub fn engineered_names(&self) -> Vec<String> {
        ENGINEERED.iter().map(|s| s.to_string()).collect()
    }
}

pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Ordered schema: continuous, categorical codes, flags, one-hot columns.
    pub fn declare_schema(one_hot: &[OneHotGroup]) -> FeatureSchema {
        let mut features: Vec<FeatureSpec> = RAW_CONTINUOUS
            .iter()
            .map(|name| FeatureSpec::continuous(*name))
            .collect();
        features.push(FeatureSpec::continuous("EngagedBehaviourScore"));
        features.push(FeatureSpec::continuous("AssignmentCompletionRate"));
        features.push(FeatureSpec::continuous("LateNightRatio"));

        features.push(FeatureSpec::categorical("GPATier", 0.0, GPA_TIER_BOUNDS.len() as f64));
        features.push(FeatureSpec::categorical("YearOfStudy", 1.0, 7.0));

        features.push(FeatureSpec::flag("AcademicDeclineFlag"));
        features.push(FeatureSpec::flag("SocialWithdrawalFlag"));
        features.push(FeatureSpec::flag("DigitalDisengagementFlag"));
        features.push(FeatureSpec::flag("IsActiveStudent"));

        for group in one_hot {
            features.extend(group.feature_names().into_iter().map(FeatureSpec::flag));
        }

        FeatureSchema::new(features)
    }

    /// Derive features for every record, validating each row against the schema.
    pub fn engineer(records: &[StudentRecord]) -> Result<EngineeredData> {
        if records.is_empty() {
            return Err(PipelineError::FeatureEngineering(
                "no cleaned records to engineer".to_string(),
            ));
        }

        let one_hot = one_hot_groups(records);
        let schema = Self::declare_schema(&one_hot);
        debug!("Declared feature schema with {} features", schema.len());

        let max_login = records
            .iter()
            .map(|r| r.avg_login_frequency)
            .fold(0.0_f64, f64::max);
        let max_forum = records
            .iter()
            .map(|r| r.avg_forum_activity)
            .fold(0.0_f64, f64::max);

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let values = Self::feature_values(record, &one_hot, max_login, max_forum)?;
            let label = u8::from(record.at_risk);
            schema.check_row(&values, label).map_err(|reason| {
                PipelineError::FeatureEngineering(format!(
                    "student {}: {}",
                    record.student_id, reason
                ))
            })?;
            rows.push(FeatureRow::organic(record.student_id.clone(), values, label));
        }

        info!(
            "Engineered {} features ({} derived) for {} rows",
            schema.len(),
            ENGINEERED.len(),
            rows.len()
        );

        Ok(EngineeredData {
            dataset: Dataset::new(schema, rows),
            one_hot,
        })
    }

    fn feature_values(
        r: &StudentRecord,
        one_hot: &[OneHotGroup],
        max_login: f64,
        max_forum: f64,
    ) -> Result<Vec<f64>> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };

        let mut values = vec![
            r.avg_login_frequency,
            r.total_missed,
            r.total_submitted,
            r.avg_forum_activity,
            r.avg_session_duration,
            r.total_downloads,
            r.total_quiz_attempts,
            r.gpa,
            r.gpa_change,
            r.credit_completion,
            r.avg_attendance_rate,
            r.avg_library_visits,
            r.avg_dining_swipes,
            r.avg_late_night_sessions,
            r.avg_recreation_use,
            engagement_score(
                r.avg_login_frequency,
                r.avg_forum_activity,
                r.avg_attendance_rate,
                max_login,
                max_forum,
            ),
            assignment_completion_rate(r.total_submitted, r.total_missed),
            late_night_ratio(r.avg_late_night_sessions, r.avg_login_frequency),
            f64::from(gpa_tier(r.gpa)),
            f64::from(r.year_of_study),
            flag(academic_decline(r.gpa_change)),
            flag(social_withdrawal(
                r.avg_attendance_rate,
                r.avg_library_visits,
                r.avg_dining_swipes,
            )),
            flag(digital_disengagement(
                r.avg_login_frequency,
                r.total_missed,
                r.avg_session_duration,
            )),
            flag(r.enrolment_status == ACTIVE_STATUS),
        ];

        for group in one_hot {
            let category = match group.column {
                "Gender" => &r.gender,
                "Programme" => &r.programme,
                "AcademicStanding" => &r.academic_standing,
                other => {
                    return Err(PipelineError::FeatureEngineering(format!(
                        "no raw column for one-hot group '{}'",
                        other
                    )));
                }
            };
            group.encode_into(category, &mut values);
        }

        Ok(values)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::schema::FeatureKind;

    pub(crate) fn record(id: &str, gpa: f64, at_risk: bool) -> StudentRecord {
        StudentRecord {
            student_id: id.to_string(),
            gender: "Female".to_string(),
            programme: "BSc Data Science".to_string(),
            year_of_study: 2,
            enrolment_status: "Active".to_string(),
            academic_standing: "Good Standing".to_string(),
            avg_login_frequency: 4.0,
            total_missed: 2.0,
            total_submitted: 8.0,
            avg_forum_activity: 2.0,
            avg_session_duration: 30.0,
            total_downloads: 15.0,
            total_quiz_attempts: 6.0,
            gpa,
            gpa_change: -0.8,
            credit_completion: 85.0,
            avg_attendance_rate: 40.0,
            avg_library_visits: 0.5,
            avg_dining_swipes: 9.0,
            avg_late_night_sessions: 2.0,
            avg_recreation_use: 1.0,
            at_risk,
        }
    }

    fn value(data: &EngineeredData, row: usize, name: &str) -> f64 {
        let index = data.dataset.schema.index_of(name).unwrap();
        data.dataset.rows[row].values[index]
    }

    #[test]
    fn test_engineer_derives_flags_and_scores() {
        let mut other = record("S2", 3.5, false);
        other.gender = "Male".to_string();
        other.avg_login_frequency = 8.0;
        other.avg_forum_activity = 4.0;
        let data = FeatureEngineer::engineer(&[record("S1", 1.4, true), other]).unwrap();

        assert_eq!(value(&data, 0, "AcademicDeclineFlag"), 1.0);
        assert_eq!(value(&data, 0, "SocialWithdrawalFlag"), 1.0);
        assert_eq!(value(&data, 0, "DigitalDisengagementFlag"), 0.0);
        assert_eq!(value(&data, 0, "GPATier"), 4.0);
        assert_eq!(value(&data, 1, "GPATier"), 0.0);
        assert_eq!(value(&data, 0, "AssignmentCompletionRate"), 0.8);
        assert!((value(&data, 0, "EngagedBehaviourScore") - (0.35 * 0.5 + 0.25 * 0.5 + 0.40 * 0.4)).abs() < 1e-12);
        assert_eq!(value(&data, 0, "Gender_Female"), 1.0);
        assert_eq!(value(&data, 0, "Gender_Male"), 0.0);
        assert_eq!(value(&data, 1, "Gender_Male"), 1.0);
        assert_eq!(value(&data, 0, "IsActiveStudent"), 1.0);
        assert_eq!(data.dataset.rows[0].label, 1);
        assert!(!data.dataset.rows[0].synthetic);
    }

    #[test]
    fn test_schema_order_and_kinds() {
        let data = FeatureEngineer::engineer(&[record("S1", 2.2, false)]).unwrap();
        let schema = &data.dataset.schema;
        assert_eq!(schema.continuous_indices().len(), 18);
        assert_eq!(schema.features[18].name, "GPATier");
        assert_eq!(schema.features[18].kind, FeatureKind::Categorical);
        assert_eq!(schema.features[19].name, "YearOfStudy");
        assert!(schema.names().contains(&"Programme_BSc_Data_Science"));
        assert!(schema.names().contains(&"AcademicStanding_Good_Standing"));
        assert_eq!(data.engineered_names().len(), ENGINEERED.len());
    }

    #[test]
    fn test_engineer_rejects_empty_input() {
        let err = FeatureEngineer::engineer(&[]).unwrap_err();
        assert_eq!(err.error_code(), "FEATURE_ENGINEERING_ERROR");
    }

    #[test]
    fn test_unknown_one_hot_column_is_rejected() {
        let records = [record("S1", 2.0, false)];
        let mut groups = one_hot_groups(&records);
        groups.push(OneHotGroup {
            column: "Faculty",
            categories: vec!["Science".to_string()],
        });

        let err = FeatureEngineer::feature_values(&records[0], &groups, 4.0, 2.0).unwrap_err();
        assert_eq!(err.error_code(), "FEATURE_ENGINEERING_ERROR");
        assert!(err.to_string().contains("Faculty"));
    }

    #[test]
    fn test_engineer_rejects_year_outside_schema() {
        let mut bad = record("S1", 2.0, false);
        bad.year_of_study = 9;
        let err = FeatureEngineer::engineer(&[bad]).unwrap_err();
        assert_eq!(err.error_code(), "FEATURE_ENGINEERING_ERROR");
        assert!(err.to_string().contains("YearOfStudy"));
    }
}
