use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    BatchSummary, EligibilityRow, EnrollmentTrend, LanguagePlacementRate, PlacementStatus,
    RankedStudent,
};

/// Weight vector for the composite programming score. Each component is
/// normalized against its cap, weighted, and the sum scaled to 0..=100.
/// Weights sum to 1.0. This is the only definition of the score; filtering
/// and display both call `programming_score` so the two views never drift.
pub const WEIGHT_PROBLEMS: f64 = 0.30;
pub const WEIGHT_ASSESSMENTS: f64 = 0.25;
pub const WEIGHT_MINI_PROJECTS: f64 = 0.25;
pub const WEIGHT_CERTIFICATIONS: f64 = 0.10;
pub const WEIGHT_LATEST_PROJECT: f64 = 0.10;

pub const CAP_PROBLEMS: f64 = 100.0;
pub const CAP_ASSESSMENTS: f64 = 20.0;
pub const CAP_MINI_PROJECTS: f64 = 10.0;
pub const CAP_CERTIFICATIONS: f64 = 5.0;

pub fn programming_score(row: &EligibilityRow) -> f64 {
    let problems = (f64::from(row.problems_solved) / CAP_PROBLEMS).min(1.0);
    let assessments = (f64::from(row.assessments_completed) / CAP_ASSESSMENTS).min(1.0);
    let projects = (f64::from(row.mini_projects) / CAP_MINI_PROJECTS).min(1.0);
    let certifications = (f64::from(row.certifications_earned) / CAP_CERTIFICATIONS).min(1.0);
    let latest = row.latest_project_score / 100.0;

    (WEIGHT_PROBLEMS * problems
        + WEIGHT_ASSESSMENTS * assessments
        + WEIGHT_MINI_PROJECTS * projects
        + WEIGHT_CERTIFICATIONS * certifications
        + WEIGHT_LATEST_PROJECT * latest)
        * 100.0
}

/// Arithmetic mean of the six soft-skill sub-scores, full precision.
/// Rounding happens only at display time.
pub fn soft_skills_avg(scores: [f64; 6]) -> f64 {
    scores.iter().sum::<f64>() / 6.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Minimum bars defining placement readiness. The same `>=` rule the
/// eligibility filter's mock-interview and internship options apply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadinessBar {
    pub min_mock_interview: f64,
    pub min_internships: i32,
}

impl Default for ReadinessBar {
    fn default() -> Self {
        ReadinessBar {
            min_mock_interview: 70.0,
            min_internships: 1,
        }
    }
}

pub fn placement_ready(row: &EligibilityRow, bar: &ReadinessBar) -> bool {
    row.mock_interview_score >= bar.min_mock_interview
        && row.internships_completed >= bar.min_internships
}

/// Attach derived scores and order by programming score descending,
/// student id ascending on ties.
pub fn rank(rows: Vec<EligibilityRow>, bar: &ReadinessBar) -> Vec<RankedStudent> {
    let mut ranked: Vec<RankedStudent> = rows
        .into_iter()
        .map(|row| RankedStudent {
            programming_score: programming_score(&row),
            soft_skills_avg: soft_skills_avg(row.soft_skill_scores()),
            placement_ready: placement_ready(&row, bar),
            row,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.programming_score
            .partial_cmp(&a.programming_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.row.student_id.cmp(&b.row.student_id))
    });
    ranked
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(i64),
    Score(f64),
    Rate(f64),
    Text(String),
    /// Sentinel for an average over zero records. Never a division by zero.
    NoData,
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Count(value) => write!(f, "{value}"),
            MetricValue::Score(value) => write!(f, "{value:.1}"),
            MetricValue::Rate(value) => write!(f, "{value:.1}%"),
            MetricValue::Text(value) => f.write_str(value),
            MetricValue::NoData => f.write_str("no data"),
        }
    }
}

fn rate(part: usize, total: usize) -> MetricValue {
    if total == 0 {
        MetricValue::NoData
    } else {
        MetricValue::Rate(part as f64 * 100.0 / total as f64)
    }
}

fn score_or_no_data(value: Option<f64>) -> MetricValue {
    value.map_or(MetricValue::NoData, MetricValue::Score)
}

/// Metrics for one student, or population aggregates when no id is given.
/// An id with no records yields every per-student metric as `NoData`.
pub fn compute_metrics(
    rows: &[EligibilityRow],
    student_id: Option<Uuid>,
    bar: &ReadinessBar,
) -> BTreeMap<String, MetricValue> {
    match student_id {
        Some(id) => match rows.iter().find(|row| row.student_id == id) {
            Some(row) => student_metrics(row, bar),
            None => STUDENT_METRIC_NAMES
                .iter()
                .map(|name| ((*name).to_string(), MetricValue::NoData))
                .collect(),
        },
        None => population_metrics(rows, bar),
    }
}

const STUDENT_METRIC_NAMES: [&str; 6] = [
    "internships_completed",
    "mock_interview_score",
    "placement_ready",
    "placement_status",
    "programming_score",
    "soft_skills_avg",
];

pub fn student_metrics(row: &EligibilityRow, bar: &ReadinessBar) -> BTreeMap<String, MetricValue> {
    let mut metrics = BTreeMap::new();
    metrics.insert(
        "programming_score".to_string(),
        MetricValue::Score(programming_score(row)),
    );
    metrics.insert(
        "soft_skills_avg".to_string(),
        MetricValue::Score(soft_skills_avg(row.soft_skill_scores())),
    );
    metrics.insert(
        "mock_interview_score".to_string(),
        MetricValue::Score(row.mock_interview_score),
    );
    metrics.insert(
        "internships_completed".to_string(),
        MetricValue::Count(i64::from(row.internships_completed)),
    );
    metrics.insert(
        "placement_ready".to_string(),
        MetricValue::Text(if placement_ready(row, bar) { "yes" } else { "no" }.to_string()),
    );
    metrics.insert(
        "placement_status".to_string(),
        MetricValue::Text(row.placement_status.as_db().to_string()),
    );
    if let Some(company) = &row.company_name {
        metrics.insert("company".to_string(), MetricValue::Text(company.clone()));
    }
    if let Some(package) = row.placement_package {
        metrics.insert("placement_package".to_string(), MetricValue::Score(package));
    }
    metrics
}

pub fn population_metrics(
    rows: &[EligibilityRow],
    bar: &ReadinessBar,
) -> BTreeMap<String, MetricValue> {
    let mut metrics = BTreeMap::new();
    metrics.insert(
        "students_total".to_string(),
        MetricValue::Count(rows.len() as i64),
    );

    let programming: Vec<f64> = rows.iter().map(programming_score).collect();
    let soft: Vec<f64> = rows
        .iter()
        .map(|row| soft_skills_avg(row.soft_skill_scores()))
        .collect();
    let interviews: Vec<f64> = rows.iter().map(|row| row.mock_interview_score).collect();
    metrics.insert(
        "avg_programming_score".to_string(),
        score_or_no_data(mean(&programming)),
    );
    metrics.insert("avg_soft_skills".to_string(), score_or_no_data(mean(&soft)));
    metrics.insert(
        "avg_mock_interview".to_string(),
        score_or_no_data(mean(&interviews)),
    );

    let placed = rows
        .iter()
        .filter(|row| row.placement_status == PlacementStatus::Placed)
        .count();
    let ready = rows.iter().filter(|row| placement_ready(row, bar)).count();
    metrics.insert("placement_rate".to_string(), rate(placed, rows.len()));
    metrics.insert("readiness_rate".to_string(), rate(ready, rows.len()));

    let packages: Vec<f64> = rows.iter().filter_map(|row| row.placement_package).collect();
    metrics.insert(
        "avg_package_placed".to_string(),
        score_or_no_data(mean(&packages)),
    );

    for summary in batch_summaries(rows) {
        metrics.insert(
            format!("students_by_batch.{}", summary.course_batch),
            MetricValue::Count(summary.students as i64),
        );
    }
    for language in language_rates(rows) {
        metrics.insert(
            format!("placement_rate_by_language.{}", language.language),
            MetricValue::Rate(language.placement_rate),
        );
    }
    for trend in enrollment_trends(rows) {
        metrics.insert(
            format!("placement_rate_by_year.{}", trend.enrollment_year),
            MetricValue::Rate(trend.placement_rate),
        );
    }
    metrics
}

pub fn batch_summaries(rows: &[EligibilityRow]) -> Vec<BatchSummary> {
    let mut groups: BTreeMap<&str, Vec<&EligibilityRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.course_batch.as_str()).or_default().push(row);
    }

    let bar = ReadinessBar::default();
    groups
        .into_iter()
        .map(|(batch, members)| {
            let programming: Vec<f64> = members.iter().map(|r| programming_score(r)).collect();
            let soft: Vec<f64> = members
                .iter()
                .map(|r| soft_skills_avg(r.soft_skill_scores()))
                .collect();
            BatchSummary {
                course_batch: batch.to_string(),
                students: members.len(),
                avg_programming_score: mean(&programming).unwrap_or_default(),
                avg_soft_skills: mean(&soft).unwrap_or_default(),
                placed: members
                    .iter()
                    .filter(|r| r.placement_status == PlacementStatus::Placed)
                    .count(),
                ready: members.iter().filter(|r| placement_ready(r, &bar)).count(),
            }
        })
        .collect()
}

pub fn language_rates(rows: &[EligibilityRow]) -> Vec<LanguagePlacementRate> {
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.language.as_str()).or_default();
        entry.0 += 1;
        if row.placement_status == PlacementStatus::Placed {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(language, (students, placed))| LanguagePlacementRate {
            language: language.to_string(),
            students,
            placed,
            placement_rate: placed as f64 * 100.0 / students as f64,
        })
        .collect()
}

pub fn enrollment_trends(rows: &[EligibilityRow]) -> Vec<EnrollmentTrend> {
    let mut groups: BTreeMap<i32, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let entry = groups.entry(row.enrollment_year).or_default();
        entry.0 += 1;
        if row.placement_status == PlacementStatus::Placed {
            entry.1 += 1;
        }
    }

    groups
        .into_iter()
        .map(|(enrollment_year, (students, placed))| EnrollmentTrend {
            enrollment_year,
            students,
            placed,
            placement_rate: placed as f64 * 100.0 / students as f64,
        })
        .collect()
}
