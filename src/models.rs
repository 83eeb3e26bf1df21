use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementStatus {
    Ready,
    #[serde(rename = "Not Ready")]
    NotReady,
    Placed,
}

impl PlacementStatus {
    pub fn as_db(self) -> &'static str {
        match self {
            PlacementStatus::Ready => "Ready",
            PlacementStatus::NotReady => "Not Ready",
            PlacementStatus::Placed => "Placed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Ready" => Some(PlacementStatus::Ready),
            "Not Ready" => Some(PlacementStatus::NotReady),
            "Placed" => Some(PlacementStatus::Placed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PlacementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_db())
    }
}

/// One student joined with their programming, soft-skill, and placement
/// records. The storage layer produces these; everything downstream only
/// reads and derives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityRow {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub age: i32,
    pub enrollment_year: i32,
    pub course_batch: String,
    pub city: String,
    pub language: String,
    pub problems_solved: i32,
    pub assessments_completed: i32,
    pub mini_projects: i32,
    pub certifications_earned: i32,
    pub latest_project_score: f64,
    pub communication: f64,
    pub teamwork: f64,
    pub presentation: f64,
    pub leadership: f64,
    pub critical_thinking: f64,
    pub interpersonal_skills: f64,
    pub mock_interview_score: f64,
    pub internships_completed: i32,
    pub placement_status: PlacementStatus,
    pub company_name: Option<String>,
    pub placement_package: Option<f64>,
    pub placement_date: Option<NaiveDate>,
    pub interview_rounds_cleared: i32,
}

impl EligibilityRow {
    pub fn soft_skill_scores(&self) -> [f64; 6] {
        [
            self.communication,
            self.teamwork,
            self.presentation,
            self.leadership,
            self.critical_thinking,
            self.interpersonal_skills,
        ]
    }
}

/// A row with its derived scores attached, ordered by programming score
/// descending with student id as the stable tiebreak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStudent {
    pub programming_score: f64,
    pub soft_skills_avg: f64,
    pub placement_ready: bool,
    #[serde(flatten)]
    pub row: EligibilityRow,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub course_batch: String,
    pub students: usize,
    pub avg_programming_score: f64,
    pub avg_soft_skills: f64,
    pub placed: usize,
    pub ready: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguagePlacementRate {
    pub language: String,
    pub students: usize,
    pub placed: usize,
    pub placement_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentTrend {
    pub enrollment_year: i32,
    pub students: usize,
    pub placed: usize,
    pub placement_rate: f64,
}
