use std::fmt::Write as _;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::criteria::{Comparison, EligibilityCriteria, Field, Predicate, Threshold};
use crate::error::Error;
use crate::metrics::{self, ReadinessBar};
use crate::models::{EligibilityRow, PlacementStatus, RankedStudent};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const BASE_QUERY: &str = "SELECT s.id AS student_id, s.full_name, s.email, s.age, \
     s.enrollment_year, s.course_batch, s.city, \
     p.language, p.problems_solved, p.assessments_completed, p.mini_projects, \
     p.certifications_earned, p.latest_project_score, \
     ss.communication, ss.teamwork, ss.presentation, ss.leadership, \
     ss.critical_thinking, ss.interpersonal_skills, \
     pl.mock_interview_score, pl.internships_completed, pl.placement_status, \
     pl.company_name, pl.placement_package, pl.placement_date, pl.interview_rounds_cleared \
     FROM students s \
     JOIN programming p ON p.student_id = s.id \
     JOIN soft_skills ss ON ss.student_id = s.id \
     JOIN placements pl ON pl.student_id = s.id";

fn column_expr(field: Field) -> &'static str {
    match field {
        Field::ProblemsSolved => "p.problems_solved",
        Field::SoftSkillsAvg => {
            "(ss.communication + ss.teamwork + ss.presentation + ss.leadership \
             + ss.critical_thinking + ss.interpersonal_skills) / 6.0"
        }
        Field::MockInterview => "pl.mock_interview_score",
        Field::Internships => "pl.internships_completed",
        Field::Language => "p.language",
        Field::Certifications => "p.certifications_earned",
        Field::Assessments => "p.assessments_completed",
        Field::MiniProjects => "p.mini_projects",
        Field::Status => "pl.placement_status",
    }
}

fn comparison_sql(comparison: Comparison) -> &'static str {
    match comparison {
        Comparison::AtLeast => ">=",
        Comparison::Equals => "=",
    }
}

/// Render the joined base query plus one positional bind per predicate.
/// Rows come back ordered by student id so results are deterministic
/// before ranking.
fn build_filter_sql(predicates: &[Predicate]) -> String {
    let mut query = String::from(BASE_QUERY);
    for (idx, predicate) in predicates.iter().enumerate() {
        query.push_str(if idx == 0 { " WHERE " } else { " AND " });
        let _ = write!(
            query,
            "{} {} ${}",
            column_expr(predicate.field),
            comparison_sql(predicate.comparison),
            idx + 1
        );
    }
    query.push_str(" ORDER BY s.id");
    query
}

fn row_from_pg(row: &PgRow) -> anyhow::Result<EligibilityRow> {
    let status_text: String = row.get("placement_status");
    let placement_status = PlacementStatus::parse(&status_text)
        .with_context(|| format!("unknown placement status `{status_text}`"))?;

    Ok(EligibilityRow {
        student_id: row.get("student_id"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        age: row.get("age"),
        enrollment_year: row.get("enrollment_year"),
        course_batch: row.get("course_batch"),
        city: row.get("city"),
        language: row.get("language"),
        problems_solved: row.get("problems_solved"),
        assessments_completed: row.get("assessments_completed"),
        mini_projects: row.get("mini_projects"),
        certifications_earned: row.get("certifications_earned"),
        latest_project_score: row.get("latest_project_score"),
        communication: row.get("communication"),
        teamwork: row.get("teamwork"),
        presentation: row.get("presentation"),
        leadership: row.get("leadership"),
        critical_thinking: row.get("critical_thinking"),
        interpersonal_skills: row.get("interpersonal_skills"),
        mock_interview_score: row.get("mock_interview_score"),
        internships_completed: row.get("internships_completed"),
        placement_status,
        company_name: row.get("company_name"),
        placement_package: row.get("placement_package"),
        placement_date: row.get("placement_date"),
        interview_rounds_cleared: row.get("interview_rounds_cleared"),
    })
}

/// Every metrics row must point at an existing student. The schema enforces
/// this with foreign keys, but externally populated stores may not; orphans
/// are surfaced as an error, never dropped from results.
pub async fn verify_integrity(pool: &PgPool) -> anyhow::Result<()> {
    for table in ["programming", "soft_skills", "placements"] {
        let query = format!(
            "SELECT COUNT(*) AS orphans FROM {table} t \
             LEFT JOIN students s ON s.id = t.student_id WHERE s.id IS NULL"
        );
        let orphans: i64 = sqlx::query(&query).fetch_one(pool).await?.get("orphans");
        if orphans > 0 {
            return Err(Error::MissingReference {
                table: table.to_string(),
                orphans,
            }
            .into());
        }
    }
    Ok(())
}

async fn fetch_filtered(
    pool: &PgPool,
    predicates: &[Predicate],
) -> anyhow::Result<Vec<EligibilityRow>> {
    verify_integrity(pool).await?;

    let query = build_filter_sql(predicates);
    let mut statement = sqlx::query(&query);
    for predicate in predicates {
        statement = match &predicate.value {
            Threshold::Count(value) => statement.bind(*value),
            Threshold::Score(value) => statement.bind(*value),
            Threshold::Text(value) => statement.bind(value.clone()),
        };
    }

    let records = statement.fetch_all(pool).await?;
    let mut rows = Vec::with_capacity(records.len());
    for record in &records {
        rows.push(row_from_pg(record)?);
    }
    Ok(rows)
}

/// Core filter entry point: validate, run the joined query once with all
/// predicates applied, then rank with the shared scoring functions. An
/// empty result is a valid outcome, not an error.
pub async fn filter_eligible(
    pool: &PgPool,
    criteria: &EligibilityCriteria,
    bar: &ReadinessBar,
) -> anyhow::Result<Vec<RankedStudent>> {
    criteria.validate().map_err(Error::InvalidCriteria)?;
    let rows = fetch_filtered(pool, &criteria.to_predicates()).await?;
    Ok(metrics::rank(rows, bar))
}

/// The full roster, unfiltered, for aggregation and reporting.
pub async fn fetch_roster(pool: &PgPool) -> anyhow::Result<Vec<EligibilityRow>> {
    fetch_filtered(pool, &[]).await
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("7a1e3f7c-54d1-4f2e-9c3a-1b2d4e5f6a70")?,
            "Meera Nair",
            24,
            "Female",
            "meera.nair@placeworks.dev",
            "+91-98450-11001",
            2022,
            "Batch_A_2022",
            "Bengaluru",
            2024,
        ),
        (
            Uuid::parse_str("2b4c5d6e-7f80-4a1b-8c2d-3e4f5a6b7c81")?,
            "Arjun Rao",
            23,
            "Male",
            "arjun.rao@placeworks.dev",
            "+91-98450-11002",
            2022,
            "Batch_A_2022",
            "Hyderabad",
            2024,
        ),
        (
            Uuid::parse_str("9c8d7e6f-5a4b-4c3d-a2e1-f0a9b8c7d692")?,
            "Sana Iqbal",
            25,
            "Female",
            "sana.iqbal@placeworks.dev",
            "+91-98450-11003",
            2023,
            "Batch_B_2023",
            "Chennai",
            2025,
        ),
        (
            Uuid::parse_str("4d3e2f1a-0b9c-4d8e-b7f6-a5b4c3d2e103")?,
            "Dev Patel",
            22,
            "Male",
            "dev.patel@placeworks.dev",
            "+91-98450-11004",
            2023,
            "Batch_B_2023",
            "Pune",
            2025,
        ),
        (
            Uuid::parse_str("6e5f4a3b-2c1d-4e0f-9a8b-7c6d5e4f3a14")?,
            "Lina Thomas",
            26,
            "Other",
            "lina.thomas@placeworks.dev",
            "+91-98450-11005",
            2023,
            "Batch_C_2023",
            "Kochi",
            2025,
        ),
    ];

    for (
        id,
        full_name,
        age,
        gender,
        email,
        phone,
        enrollment_year,
        course_batch,
        city,
        graduation_year,
    ) in students
    {
        sqlx::query(
            r#"
            INSERT INTO students
            (id, full_name, age, gender, email, phone, enrollment_year, course_batch, city, graduation_year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, course_batch = EXCLUDED.course_batch
            "#,
        )
        .bind(id)
        .bind(full_name)
        .bind(age)
        .bind(gender)
        .bind(email)
        .bind(phone)
        .bind(enrollment_year)
        .bind(course_batch)
        .bind(city)
        .bind(graduation_year)
        .execute(pool)
        .await?;
    }

    let programming = vec![
        ("meera.nair@placeworks.dev", "Python", 120, 18, 7, 3, 92.0),
        ("arjun.rao@placeworks.dev", "Java", 65, 11, 4, 1, 78.5),
        ("sana.iqbal@placeworks.dev", "Python", 88, 14, 6, 2, 85.0),
        ("dev.patel@placeworks.dev", "SQL", 40, 8, 2, 0, 64.0),
        ("lina.thomas@placeworks.dev", "JavaScript", 102, 16, 8, 4, 88.5),
    ];

    for (email, language, problems, assessments, projects, certifications, latest) in programming {
        let student_id = student_id_by_email(pool, email).await?;
        sqlx::query(
            r#"
            INSERT INTO programming
            (id, student_id, language, problems_solved, assessments_completed,
             mini_projects, certifications_earned, latest_project_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id) DO UPDATE
            SET language = EXCLUDED.language,
                problems_solved = EXCLUDED.problems_solved,
                assessments_completed = EXCLUDED.assessments_completed,
                mini_projects = EXCLUDED.mini_projects,
                certifications_earned = EXCLUDED.certifications_earned,
                latest_project_score = EXCLUDED.latest_project_score
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(language)
        .bind(problems)
        .bind(assessments)
        .bind(projects)
        .bind(certifications)
        .bind(latest)
        .execute(pool)
        .await?;
    }

    let soft_skills = vec![
        ("meera.nair@placeworks.dev", 88.0, 82.0, 79.0, 75.0, 90.0, 84.0),
        ("arjun.rao@placeworks.dev", 72.0, 80.0, 65.0, 70.0, 74.0, 77.0),
        ("sana.iqbal@placeworks.dev", 91.0, 85.0, 88.0, 80.0, 86.0, 89.0),
        ("dev.patel@placeworks.dev", 58.0, 66.0, 52.0, 60.0, 63.0, 61.0),
        ("lina.thomas@placeworks.dev", 84.0, 78.0, 90.0, 82.0, 80.0, 86.0),
    ];

    for (email, communication, teamwork, presentation, leadership, critical, interpersonal) in
        soft_skills
    {
        let student_id = student_id_by_email(pool, email).await?;
        sqlx::query(
            r#"
            INSERT INTO soft_skills
            (id, student_id, communication, teamwork, presentation, leadership,
             critical_thinking, interpersonal_skills)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id) DO UPDATE
            SET communication = EXCLUDED.communication,
                teamwork = EXCLUDED.teamwork,
                presentation = EXCLUDED.presentation,
                leadership = EXCLUDED.leadership,
                critical_thinking = EXCLUDED.critical_thinking,
                interpersonal_skills = EXCLUDED.interpersonal_skills
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(communication)
        .bind(teamwork)
        .bind(presentation)
        .bind(leadership)
        .bind(critical)
        .bind(interpersonal)
        .execute(pool)
        .await?;
    }

    let placements = vec![
        (
            "meera.nair@placeworks.dev",
            86.0,
            2,
            "Placed",
            Some("Nimbus Analytics"),
            Some(95000.0),
            NaiveDate::from_ymd_opt(2024, 6, 14),
            4,
        ),
        (
            "arjun.rao@placeworks.dev",
            71.0,
            1,
            "Ready",
            None,
            None,
            None,
            2,
        ),
        (
            "sana.iqbal@placeworks.dev",
            90.0,
            2,
            "Placed",
            Some("Kite Systems"),
            Some(110000.0),
            NaiveDate::from_ymd_opt(2025, 1, 20),
            5,
        ),
        (
            "dev.patel@placeworks.dev",
            48.0,
            0,
            "Not Ready",
            None,
            None,
            None,
            0,
        ),
        (
            "lina.thomas@placeworks.dev",
            77.0,
            1,
            "Ready",
            None,
            None,
            None,
            3,
        ),
    ];

    for (email, interview, internships, status, company, package, date, rounds) in placements {
        let student_id = student_id_by_email(pool, email).await?;
        sqlx::query(
            r#"
            INSERT INTO placements
            (id, student_id, mock_interview_score, internships_completed, placement_status,
             company_name, placement_package, placement_date, interview_rounds_cleared)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id) DO UPDATE
            SET mock_interview_score = EXCLUDED.mock_interview_score,
                internships_completed = EXCLUDED.internships_completed,
                placement_status = EXCLUDED.placement_status,
                company_name = EXCLUDED.company_name,
                placement_package = EXCLUDED.placement_package,
                placement_date = EXCLUDED.placement_date,
                interview_rounds_cleared = EXCLUDED.interview_rounds_cleared
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(interview)
        .bind(internships)
        .bind(status)
        .bind(company)
        .bind(package)
        .bind(date)
        .bind(rounds)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn student_id_by_email(pool: &PgPool, email: &str) -> anyhow::Result<Uuid> {
    let id = sqlx::query("SELECT id FROM students WHERE email = $1")
        .bind(email)
        .fetch_one(pool)
        .await?
        .get("id");
    Ok(id)
}

/// Onboard students from a CSV export: one row per student carrying all
/// four record groups. Upserts on email so re-imports are idempotent.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        age: i32,
        gender: String,
        phone: String,
        enrollment_year: i32,
        course_batch: String,
        city: String,
        graduation_year: i32,
        language: String,
        problems_solved: i32,
        assessments_completed: i32,
        mini_projects: i32,
        certifications_earned: i32,
        latest_project_score: f64,
        communication: f64,
        teamwork: f64,
        presentation: f64,
        leadership: f64,
        critical_thinking: f64,
        interpersonal_skills: f64,
        mock_interview_score: f64,
        internships_completed: i32,
        placement_status: String,
        company_name: Option<String>,
        placement_package: Option<f64>,
        placement_date: Option<NaiveDate>,
        interview_rounds_cleared: i32,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let status = PlacementStatus::parse(&row.placement_status).with_context(|| {
            format!(
                "row for {}: unknown placement status `{}`",
                row.email, row.placement_status
            )
        })?;
        if status == PlacementStatus::Placed
            && (row.company_name.is_none() || row.placement_package.is_none())
        {
            anyhow::bail!(
                "row for {}: placed students must carry company and package",
                row.email
            );
        }

        let student_id: Uuid = sqlx::query(
            r#"
            INSERT INTO students
            (id, full_name, age, gender, email, phone, enrollment_year, course_batch, city, graduation_year)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, course_batch = EXCLUDED.course_batch
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(row.age)
        .bind(&row.gender)
        .bind(&row.email)
        .bind(&row.phone)
        .bind(row.enrollment_year)
        .bind(&row.course_batch)
        .bind(&row.city)
        .bind(row.graduation_year)
        .fetch_one(pool)
        .await?
        .get("id");

        sqlx::query(
            r#"
            INSERT INTO programming
            (id, student_id, language, problems_solved, assessments_completed,
             mini_projects, certifications_earned, latest_project_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id) DO UPDATE
            SET language = EXCLUDED.language,
                problems_solved = EXCLUDED.problems_solved,
                assessments_completed = EXCLUDED.assessments_completed,
                mini_projects = EXCLUDED.mini_projects,
                certifications_earned = EXCLUDED.certifications_earned,
                latest_project_score = EXCLUDED.latest_project_score
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(&row.language)
        .bind(row.problems_solved)
        .bind(row.assessments_completed)
        .bind(row.mini_projects)
        .bind(row.certifications_earned)
        .bind(row.latest_project_score)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO soft_skills
            (id, student_id, communication, teamwork, presentation, leadership,
             critical_thinking, interpersonal_skills)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (student_id) DO UPDATE
            SET communication = EXCLUDED.communication,
                teamwork = EXCLUDED.teamwork,
                presentation = EXCLUDED.presentation,
                leadership = EXCLUDED.leadership,
                critical_thinking = EXCLUDED.critical_thinking,
                interpersonal_skills = EXCLUDED.interpersonal_skills
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(row.communication)
        .bind(row.teamwork)
        .bind(row.presentation)
        .bind(row.leadership)
        .bind(row.critical_thinking)
        .bind(row.interpersonal_skills)
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO placements
            (id, student_id, mock_interview_score, internships_completed, placement_status,
             company_name, placement_package, placement_date, interview_rounds_cleared)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (student_id) DO UPDATE
            SET mock_interview_score = EXCLUDED.mock_interview_score,
                internships_completed = EXCLUDED.internships_completed,
                placement_status = EXCLUDED.placement_status,
                company_name = EXCLUDED.company_name,
                placement_package = EXCLUDED.placement_package,
                placement_date = EXCLUDED.placement_date,
                interview_rounds_cleared = EXCLUDED.interview_rounds_cleared
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(row.mock_interview_score)
        .bind(row.internships_completed)
        .bind(status.as_db())
        .bind(&row.company_name)
        .bind(row.placement_package)
        .bind(row.placement_date)
        .bind(row.interview_rounds_cleared)
        .execute(pool)
        .await?;

        imported += 1;
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfiltered_query_has_no_where_clause() {
        let query = build_filter_sql(&[]);
        assert!(!query.contains("WHERE"));
        assert!(query.ends_with(" ORDER BY s.id"));
    }

    #[test]
    fn predicates_become_positional_conjuncts() {
        let criteria = EligibilityCriteria {
            min_problems_solved: Some(50),
            programming_language: Some("Python".to_string()),
            ..Default::default()
        };
        let query = build_filter_sql(&criteria.to_predicates());
        assert!(query.contains(" WHERE p.problems_solved >= $1"));
        assert!(query.contains(" AND p.language = $2"));
    }

    #[test]
    fn soft_skills_predicate_averages_in_sql() {
        let criteria = EligibilityCriteria {
            min_soft_skills_avg: Some(75.0),
            ..Default::default()
        };
        let query = build_filter_sql(&criteria.to_predicates());
        assert!(query.contains("/ 6.0 >= $1"));
    }

    #[test]
    fn every_specified_option_lands_in_the_query() {
        let criteria = EligibilityCriteria {
            min_problems_solved: Some(10),
            min_soft_skills_avg: Some(60.0),
            min_mock_interview: Some(60.0),
            min_internships: Some(1),
            programming_language: Some("SQL".to_string()),
            min_certifications: Some(1),
            min_assessments: Some(5),
            min_mini_projects: Some(2),
            placement_status: Some(PlacementStatus::Ready),
        };
        let predicates = criteria.to_predicates();
        assert_eq!(predicates.len(), 9);
        let query = build_filter_sql(&predicates);
        assert!(query.contains("$9"));
    }
}
