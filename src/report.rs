use std::fmt::Write;

use chrono::NaiveDate;

use crate::metrics::{self, MetricValue, ReadinessBar};
use crate::models::EligibilityRow;

/// Render the population metrics and a top-candidate ranking as markdown.
pub fn build_report(rows: &[EligibilityRow], bar: &ReadinessBar, generated_on: NaiveDate) -> String {
    let population = metrics::population_metrics(rows, bar);
    let batches = metrics::batch_summaries(rows);
    let languages = metrics::language_rates(rows);
    let trends = metrics::enrollment_trends(rows);
    let ranked = metrics::rank(rows.to_vec(), bar);

    let mut output = String::new();

    let _ = writeln!(output, "# Placement Readiness Report");
    let _ = writeln!(
        output,
        "Generated on {} covering {} students",
        generated_on,
        rows.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Cohort Overview");

    for name in [
        "placement_rate",
        "readiness_rate",
        "avg_programming_score",
        "avg_soft_skills",
        "avg_mock_interview",
        "avg_package_placed",
    ] {
        let value = population.get(name).unwrap_or(&MetricValue::NoData);
        let _ = writeln!(output, "- {}: {}", name.replace('_', " "), value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Batch Summary");
    if batches.is_empty() {
        let _ = writeln!(output, "No students on record.");
    } else {
        for batch in &batches {
            let _ = writeln!(
                output,
                "- {}: {} students, programming {:.1}, soft skills {:.1}, {} placed, {} ready",
                batch.course_batch,
                batch.students,
                batch.avg_programming_score,
                batch.avg_soft_skills,
                batch.placed,
                batch.ready
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Placement Rate by Language");
    if languages.is_empty() {
        let _ = writeln!(output, "No programming records.");
    } else {
        for language in &languages {
            let _ = writeln!(
                output,
                "- {}: {:.1}% ({} of {} placed)",
                language.language, language.placement_rate, language.placed, language.students
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Enrollment Trend");
    if trends.is_empty() {
        let _ = writeln!(output, "No enrollment data.");
    } else {
        for trend in &trends {
            let _ = writeln!(
                output,
                "- {}: {} students, placement rate {:.1}%",
                trend.enrollment_year, trend.students, trend.placement_rate
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Candidates");
    if ranked.is_empty() {
        let _ = writeln!(output, "No candidates match.");
    } else {
        for student in ranked.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}) programming {:.1}, soft skills {:.1}, interview {:.0}, {}",
                student.row.full_name,
                student.row.email,
                student.row.course_batch,
                student.programming_score,
                student.soft_skills_avg,
                student.row.mock_interview_score,
                student.row.placement_status
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlacementStatus;
    use uuid::Uuid;

    fn sample_row(n: u128, batch: &str) -> EligibilityRow {
        EligibilityRow {
            student_id: Uuid::from_u128(n),
            full_name: format!("Student {n}"),
            email: format!("student{n}@example.com"),
            age: 23,
            enrollment_year: 2022,
            course_batch: batch.to_string(),
            city: "Chennai".to_string(),
            language: "Python".to_string(),
            problems_solved: 60,
            assessments_completed: 12,
            mini_projects: 4,
            certifications_earned: 2,
            latest_project_score: 80.0,
            communication: 70.0,
            teamwork: 70.0,
            presentation: 70.0,
            leadership: 70.0,
            critical_thinking: 70.0,
            interpersonal_skills: 70.0,
            mock_interview_score: 75.0,
            internships_completed: 1,
            placement_status: PlacementStatus::Ready,
            company_name: None,
            placement_package: None,
            placement_date: None,
            interview_rounds_cleared: 2,
        }
    }

    fn report_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn empty_roster_reports_no_data() {
        let report = build_report(&[], &ReadinessBar::default(), report_date());
        assert!(report.contains("covering 0 students"));
        assert!(report.contains("placement rate: no data"));
        assert!(report.contains("No students on record."));
        assert!(report.contains("No candidates match."));
    }

    #[test]
    fn report_lists_batches_and_candidates() {
        let rows = vec![
            sample_row(1, "Batch_A_2022"),
            sample_row(2, "Batch_B_2023"),
        ];
        let report = build_report(&rows, &ReadinessBar::default(), report_date());
        assert!(report.contains("- Batch_A_2022: 1 students"));
        assert!(report.contains("- Batch_B_2023: 1 students"));
        assert!(report.contains("- Python: 0.0% (0 of 2 placed)"));
        assert!(report.contains("Student 1"));
    }
}
