use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod criteria;
mod db;
mod error;
mod metrics;
mod models;
mod report;

use criteria::EligibilityCriteria;
use error::{CriteriaError, Error};
use metrics::ReadinessBar;
use models::PlacementStatus;

#[derive(Parser)]
#[command(name = "placement-eligibility")]
#[command(about = "Placement eligibility filtering and analytics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small deterministic sample roster
    Seed,
    /// Onboard students from a CSV file (one row per student)
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Verify that every metrics record references an existing student
    Check,
    /// Filter students against eligibility thresholds
    Filter {
        #[arg(long)]
        min_problems_solved: Option<u32>,
        #[arg(long)]
        min_soft_skills_avg: Option<f64>,
        #[arg(long)]
        min_mock_interview: Option<f64>,
        #[arg(long)]
        min_internships: Option<u32>,
        #[arg(long)]
        programming_language: Option<String>,
        #[arg(long)]
        min_certifications: Option<u32>,
        #[arg(long)]
        min_assessments: Option<u32>,
        #[arg(long)]
        min_mini_projects: Option<u32>,
        /// One of: Ready, "Not Ready", Placed
        #[arg(long)]
        placement_status: Option<String>,
        /// JSON file of criteria; unknown options are rejected
        #[arg(long, conflicts_with_all = [
            "min_problems_solved", "min_soft_skills_avg", "min_mock_interview",
            "min_internships", "programming_language", "min_certifications",
            "min_assessments", "min_mini_projects", "placement_status",
        ])]
        criteria: Option<PathBuf>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Derived metrics for one student, or population aggregates
    Metrics {
        #[arg(long)]
        student: Option<Uuid>,
        #[arg(long, default_value_t = 70.0)]
        interview_bar: f64,
        #[arg(long, default_value_t = 1)]
        internship_bar: i32,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 70.0)]
        interview_bar: f64,
        #[arg(long, default_value_t = 1)]
        internship_bar: i32,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn readiness_bar(interview_bar: f64, internship_bar: i32) -> Result<ReadinessBar, Error> {
    if !(0.0..=100.0).contains(&interview_bar) {
        return Err(Error::InvalidCriteria(CriteriaError::OutOfRange {
            field: "interview_bar",
            value: interview_bar,
        }));
    }
    Ok(ReadinessBar {
        min_mock_interview: interview_bar,
        min_internships: internship_bar,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let imported = db::import_csv(&pool, &csv).await?;
            println!("Imported {imported} students from {}.", csv.display());
        }
        Commands::Check => {
            db::verify_integrity(&pool).await?;
            println!("Referential integrity OK.");
        }
        Commands::Filter {
            min_problems_solved,
            min_soft_skills_avg,
            min_mock_interview,
            min_internships,
            programming_language,
            min_certifications,
            min_assessments,
            min_mini_projects,
            placement_status,
            criteria,
            limit,
            json,
        } => {
            let criteria = match criteria {
                Some(path) => {
                    let text = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    EligibilityCriteria::from_json(&text).map_err(Error::InvalidCriteria)?
                }
                None => {
                    let placement_status = placement_status
                        .map(|value| {
                            PlacementStatus::parse(&value).ok_or_else(|| {
                                Error::InvalidCriteria(CriteriaError::Malformed(format!(
                                    "unknown placement status `{value}`"
                                )))
                            })
                        })
                        .transpose()?;
                    EligibilityCriteria {
                        min_problems_solved,
                        min_soft_skills_avg,
                        min_mock_interview,
                        min_internships,
                        programming_language,
                        min_certifications,
                        min_assessments,
                        min_mini_projects,
                        placement_status,
                    }
                }
            };

            let students = db::filter_eligible(&pool, &criteria, &ReadinessBar::default()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&students)?);
            } else if students.is_empty() {
                println!("No students matched the given criteria.");
            } else {
                println!("Eligible students ({} matched):", students.len());
                for student in students.iter().take(limit) {
                    println!(
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
        }
        Commands::Metrics {
            student,
            interview_bar,
            internship_bar,
            json,
        } => {
            let bar = readiness_bar(interview_bar, internship_bar)?;
            let rows = db::fetch_roster(&pool).await?;
            let computed = metrics::compute_metrics(&rows, student, &bar);
            if json {
                println!("{}", serde_json::to_string_pretty(&computed)?);
            } else {
                if let Some(id) = student {
                    if !rows.iter().any(|row| row.student_id == id) {
                        println!("No records for student {id}.");
                    }
                }
                for (name, value) in &computed {
                    println!("{name}: {value}");
                }
            }
        }
        Commands::Report {
            interview_bar,
            internship_bar,
            out,
        } => {
            let bar = readiness_bar(interview_bar, internship_bar)?;
            let rows = db::fetch_roster(&pool).await?;
            let report = report::build_report(&rows, &bar, Utc::now().date_naive());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
