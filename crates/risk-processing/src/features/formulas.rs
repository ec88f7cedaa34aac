//! Fixed feature formulas and their thresholds.

/// GPA change below this marks an academic decline.
pub const ACADEMIC_DECLINE_THRESHOLD: f64 = -0.5;

/// Attendance rate (percent) below which a student counts as withdrawn.
pub const LOW_ATTENDANCE_THRESHOLD: f64 = 50.0;
/// Average weekly library visits below which a student counts as withdrawn.
pub const LOW_LIBRARY_THRESHOLD: f64 = 1.0;
/// Average weekly dining swipes below which a student counts as withdrawn.
pub const LOW_DINING_THRESHOLD: f64 = 5.0;
/// How many of the three social signals must fire.
pub const SOCIAL_WITHDRAWAL_MIN_SIGNALS: usize = 2;

pub const LOW_LOGIN_THRESHOLD: f64 = 2.0;
pub const HIGH_MISSED_THRESHOLD: f64 = 3.0;
pub const SHORT_SESSION_THRESHOLD: f64 = 10.0;

pub const ENGAGEMENT_LOGIN_WEIGHT: f64 = 0.35;
pub const ENGAGEMENT_FORUM_WEIGHT: f64 = 0.25;
pub const ENGAGEMENT_ATTENDANCE_WEIGHT: f64 = 0.40;

/// Upper GPA bound of each tier, worst tier first. GPA above the last bound is tier 0.
pub const GPA_TIER_BOUNDS: [f64; 4] = [1.5, 2.0, 2.5, 3.0];

/// Enrolment status that maps to `IsActiveStudent = 1`.
pub const ACTIVE_STATUS: &str = "Active";

pub fn academic_decline(gpa_change: f64) -> bool {
    gpa_change < ACADEMIC_DECLINE_THRESHOLD
}

pub fn social_withdrawal(attendance: f64, library_visits: f64, dining_swipes: f64) -> bool {
    let signals = [
        attendance < LOW_ATTENDANCE_THRESHOLD,
        library_visits < LOW_LIBRARY_THRESHOLD,
        dining_swipes < LOW_DINING_THRESHOLD,
    ];
    signals.iter().filter(|s| **s).count() >= SOCIAL_WITHDRAWAL_MIN_SIGNALS
}

pub fn digital_disengagement(login: f64, missed: f64, session_minutes: f64) -> bool {
    login < LOW_LOGIN_THRESHOLD && missed > HIGH_MISSED_THRESHOLD && session_minutes < SHORT_SESSION_THRESHOLD
}

/// `value / max`, clamped to [0, 1]; a zero maximum normalises to 0.
fn normalise(value: f64, max: f64) -> f64 {
    if max > 0.0 {
        (value / max).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Weighted engagement composite in [0, 1].
///
/// Login and forum activity are normalised by the dataset maximum, attendance
/// by its 100% ceiling.
pub fn engagement_score(login: f64, forum: f64, attendance: f64, max_login: f64, max_forum: f64) -> f64 {
    ENGAGEMENT_LOGIN_WEIGHT * normalise(login, max_login)
        + ENGAGEMENT_FORUM_WEIGHT * normalise(forum, max_forum)
        + ENGAGEMENT_ATTENDANCE_WEIGHT * normalise(attendance, 100.0)
}

pub fn assignment_completion_rate(submitted: f64, missed: f64) -> f64 {
    let total = submitted + missed;
    if total > 0.0 { submitted / total } else { 0.0 }
}

pub fn late_night_ratio(late_night_sessions: f64, login: f64) -> f64 {
    late_night_sessions / (login + 1.0)
}

/// Ordinal GPA tier: 4 for GPA ≤ 1.5 down to 0 for GPA > 3.0.
pub fn gpa_tier(gpa: f64) -> u8 {
    let worse_or_equal = GPA_TIER_BOUNDS.iter().position(|bound| gpa <= *bound);
    match worse_or_equal {
        Some(index) => (GPA_TIER_BOUNDS.len() - index) as u8,
        None => 0,
    }
}
