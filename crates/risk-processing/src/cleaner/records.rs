//! Materialization of typed student records and duplicate removal.

use crate::error::{PipelineError, Result};
use crate::schema::{RISK_LABEL, STUDENT_ID};
use crate::types::StudentRecord;
use polars::prelude::*;
use std::collections::HashSet;

fn text_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df.column(name)?.as_materialized_series();
    series
        .str()?
        .into_iter()
        .map(|v| {
            v.map(str::to_string)
                .ok_or_else(|| PipelineError::Internal(format!("null left in '{}'", name)))
        })
        .collect()
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df.column(name)?.as_materialized_series();
    series
        .f64()?
        .into_iter()
        .map(|v| v.ok_or_else(|| PipelineError::Internal(format!("null left in '{}'", name))))
        .collect()
}

/// Convert a fully imputed, coerced frame into records in row order.
pub(crate) fn to_records(df: &DataFrame) -> Result<Vec<StudentRecord>> {
    let ids = text_column(df, STUDENT_ID)?;
    let gender = text_column(df, "Gender")?;
    let programme = text_column(df, "Programme")?;
    let enrolment = text_column(df, "EnrolmentStatus")?;
    let standing = text_column(df, "AcademicStanding")?;
    let year = numeric_column(df, "YearOfStudy")?;
    let login = numeric_column(df, "AvgLoginFrequency")?;
    let missed = numeric_column(df, "TotalMissed")?;
    let submitted = numeric_column(df, "TotalSubmitted")?;
    let forum = numeric_column(df, "AvgForumActivity")?;
    let session = numeric_column(df, "AvgSessionDuration")?;
    let downloads = numeric_column(df, "TotalDownloads")?;
    let quizzes = numeric_column(df, "TotalQuizAttempts")?;
    let gpa = numeric_column(df, "GPA")?;
    let gpa_change = numeric_column(df, "GPAChange")?;
    let credits = numeric_column(df, "CreditCompletion")?;
    let attendance = numeric_column(df, "AvgAttendanceRate")?;
    let library = numeric_column(df, "AvgLibraryVisits")?;
    let dining = numeric_column(df, "AvgDiningSwipes")?;
    let late_night = numeric_column(df, "AvgLateNightSessions")?;
    let recreation = numeric_column(df, "AvgRecreationUse")?;
    let label = numeric_column(df, RISK_LABEL)?;

    Ok((0..df.height())
        .map(|i| StudentRecord {
            student_id: ids[i].clone(),
            gender: gender[i].clone(),
            programme: programme[i].clone(),
            year_of_study: year[i].round() as u8,
            enrolment_status: enrolment[i].clone(),
            academic_standing: standing[i].clone(),
            avg_login_frequency: login[i],
            total_missed: missed[i],
            total_submitted: submitted[i],
            avg_forum_activity: forum[i],
            avg_session_duration: session[i],
            total_downloads: downloads[i],
            total_quiz_attempts: quizzes[i],
            gpa: gpa[i],
            gpa_change: gpa_change[i],
            credit_completion: credits[i],
            avg_attendance_rate: attendance[i],
            avg_library_visits: library[i],
            avg_dining_swipes: dining[i],
            avg_late_night_sessions: late_night[i],
            avg_recreation_use: recreation[i],
            at_risk: label[i] == 1.0,
        })
        .collect())
}

/// Counts of rows removed by [`deduplicate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DedupCounts {
    pub exact: usize,
    pub repeated_ids: usize,
}

/// Drop exact duplicates, then later rows that reuse a student ID.
///
/// The first occurrence always wins and row order is preserved.
pub(crate) fn deduplicate(records: Vec<StudentRecord>) -> Result<(Vec<StudentRecord>, DedupCounts)> {
    let mut counts = DedupCounts::default();
    let mut seen_rows: HashSet<String> = HashSet::with_capacity(records.len());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if !seen_rows.insert(serde_json::to_string(&record)?) {
            counts.exact += 1;
            continue;
        }
        if !seen_ids.insert(record.student_id.clone()) {
            counts.repeated_ids += 1;
            continue;
        }
        kept.push(record);
    }

    Ok((kept, counts))
}
