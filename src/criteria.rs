use serde::{Deserialize, Serialize};

use crate::error::CriteriaError;
use crate::metrics;
use crate::models::{EligibilityRow, PlacementStatus};

/// Named thresholds a caller supplies to narrow the student population.
/// Absent fields impose no constraint; present fields are ANDed together.
///
/// The loose criteria dictionary this replaces silently ignored unknown
/// keys. Here the option set is closed: the struct cannot represent an
/// unrecognized option, and the JSON boundary rejects one outright.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EligibilityCriteria {
    pub min_problems_solved: Option<u32>,
    pub min_soft_skills_avg: Option<f64>,
    pub min_mock_interview: Option<f64>,
    pub min_internships: Option<u32>,
    pub programming_language: Option<String>,
    pub min_certifications: Option<u32>,
    pub min_assessments: Option<u32>,
    pub min_mini_projects: Option<u32>,
    pub placement_status: Option<PlacementStatus>,
}

/// Joined-relation fields a predicate may constrain. The storage layer maps
/// each to a column expression; `extract` reads the same value off an
/// in-memory row so both evaluations share one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ProblemsSolved,
    SoftSkillsAvg,
    MockInterview,
    Internships,
    Language,
    Certifications,
    Assessments,
    MiniProjects,
    Status,
}

impl Field {
    pub fn extract(self, row: &EligibilityRow) -> Threshold {
        match self {
            Field::ProblemsSolved => Threshold::Count(i64::from(row.problems_solved)),
            Field::SoftSkillsAvg => {
                Threshold::Score(metrics::soft_skills_avg(row.soft_skill_scores()))
            }
            Field::MockInterview => Threshold::Score(row.mock_interview_score),
            Field::Internships => Threshold::Count(i64::from(row.internships_completed)),
            Field::Language => Threshold::Text(row.language.clone()),
            Field::Certifications => Threshold::Count(i64::from(row.certifications_earned)),
            Field::Assessments => Threshold::Count(i64::from(row.assessments_completed)),
            Field::MiniProjects => Threshold::Count(i64::from(row.mini_projects)),
            Field::Status => Threshold::Text(row.placement_status.as_db().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AtLeast,
    Equals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Count(i64),
    Score(f64),
    Text(String),
}

/// One conjunct of the eligibility filter, independent of SQL syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: Field,
    pub comparison: Comparison,
    pub value: Threshold,
}

impl Predicate {
    pub fn eval(&self, row: &EligibilityRow) -> bool {
        match (Field::extract(self.field, row), &self.value, self.comparison) {
            (Threshold::Count(actual), Threshold::Count(min), Comparison::AtLeast) => {
                actual >= *min
            }
            (Threshold::Score(actual), Threshold::Score(min), Comparison::AtLeast) => {
                actual >= *min
            }
            (Threshold::Text(actual), Threshold::Text(wanted), Comparison::Equals) => {
                actual == *wanted
            }
            _ => false,
        }
    }
}

impl EligibilityCriteria {
    /// Parse criteria from a JSON document. Unknown options and malformed
    /// values fail here, before anything touches the database.
    pub fn from_json(input: &str) -> Result<Self, CriteriaError> {
        let criteria: Self = serde_json::from_str(input).map_err(|err| {
            let message = err.to_string();
            if let Some(rest) = message.strip_prefix("unknown field `") {
                let name = rest.split('`').next().unwrap_or_default().to_string();
                CriteriaError::UnknownOption(name)
            } else {
                CriteriaError::Malformed(message)
            }
        })?;
        criteria.validate()?;
        Ok(criteria)
    }

    /// Bounded score thresholds must land in [0, 100]. Runs before any
    /// query executes so a bad threshold never produces a partial result.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        let bounded = [
            ("min_soft_skills_avg", self.min_soft_skills_avg),
            ("min_mock_interview", self.min_mock_interview),
        ];
        for (field, value) in bounded {
            if let Some(value) = value {
                if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                    return Err(CriteriaError::OutOfRange { field, value });
                }
            }
        }
        Ok(())
    }

    /// Translate present options into an ordered conjunction of predicates.
    /// Order is fixed for deterministic SQL text; the result set does not
    /// depend on it.
    pub fn to_predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::new();
        let mut at_least = |field: Field, value: Threshold| {
            predicates.push(Predicate {
                field,
                comparison: Comparison::AtLeast,
                value,
            });
        };

        if let Some(min) = self.min_problems_solved {
            at_least(Field::ProblemsSolved, Threshold::Count(i64::from(min)));
        }
        if let Some(min) = self.min_soft_skills_avg {
            at_least(Field::SoftSkillsAvg, Threshold::Score(min));
        }
        if let Some(min) = self.min_mock_interview {
            at_least(Field::MockInterview, Threshold::Score(min));
        }
        if let Some(min) = self.min_internships {
            at_least(Field::Internships, Threshold::Count(i64::from(min)));
        }
        if let Some(min) = self.min_certifications {
            at_least(Field::Certifications, Threshold::Count(i64::from(min)));
        }
        if let Some(min) = self.min_assessments {
            at_least(Field::Assessments, Threshold::Count(i64::from(min)));
        }
        if let Some(min) = self.min_mini_projects {
            at_least(Field::MiniProjects, Threshold::Count(i64::from(min)));
        }
        if let Some(language) = &self.programming_language {
            predicates.push(Predicate {
                field: Field::Language,
                comparison: Comparison::Equals,
                value: Threshold::Text(language.clone()),
            });
        }
        if let Some(status) = self.placement_status {
            predicates.push(Predicate {
                field: Field::Status,
                comparison: Comparison::Equals,
                value: Threshold::Text(status.as_db().to_string()),
            });
        }
        predicates
    }

    /// Evaluate all predicates against an in-memory joined row. Mirrors the
    /// SQL filter exactly; tests lean on this to avoid a live database.
    pub fn matches(&self, row: &EligibilityRow) -> bool {
        self.to_predicates().iter().all(|p| p.eval(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_row(n: u128) -> EligibilityRow {
        EligibilityRow {
            student_id: Uuid::from_u128(n),
            full_name: format!("Student {n}"),
            email: format!("student{n}@example.com"),
            age: 23,
            enrollment_year: 2022,
            course_batch: "Batch_A_2022".to_string(),
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
            mock_interview_score: 65.0,
            internships_completed: 1,
            placement_status: PlacementStatus::Ready,
            company_name: None,
            placement_package: None,
            placement_date: None,
            interview_rounds_cleared: 2,
        }
    }

    #[test]
    fn empty_criteria_keep_every_row() {
        let criteria = EligibilityCriteria::default();
        assert!(criteria.to_predicates().is_empty());
        for n in 0..5 {
            assert!(criteria.matches(&sample_row(n)));
        }
    }

    #[test]
    fn zero_minimum_equals_no_constraint() {
        let rows: Vec<EligibilityRow> = (0..4)
            .map(|n| {
                let mut row = sample_row(n);
                row.problems_solved = (n as i32) * 10;
                row
            })
            .collect();

        let unconstrained = EligibilityCriteria::default();
        let zero = EligibilityCriteria {
            min_problems_solved: Some(0),
            ..Default::default()
        };

        for row in &rows {
            assert_eq!(unconstrained.matches(row), zero.matches(row));
        }
    }

    #[test]
    fn adding_an_option_never_grows_the_result() {
        let rows: Vec<EligibilityRow> = (0..6)
            .map(|n| {
                let mut row = sample_row(n);
                row.problems_solved = (n as i32) * 25;
                row.mock_interview_score = 40.0 + (n as f64) * 10.0;
                row
            })
            .collect();

        let base = EligibilityCriteria {
            min_problems_solved: Some(50),
            ..Default::default()
        };
        let narrowed = EligibilityCriteria {
            min_mock_interview: Some(70.0),
            ..base.clone()
        };

        let base_matches: Vec<Uuid> = rows
            .iter()
            .filter(|r| base.matches(r))
            .map(|r| r.student_id)
            .collect();
        let narrowed_matches: Vec<Uuid> = rows
            .iter()
            .filter(|r| narrowed.matches(r))
            .map(|r| r.student_id)
            .collect();

        assert!(narrowed_matches.len() <= base_matches.len());
        for id in &narrowed_matches {
            assert!(base_matches.contains(id));
        }
    }

    #[test]
    fn interview_and_internship_bars_combine() {
        let mut rows = Vec::new();
        for (n, (interview, internships)) in [(50.0, 0), (75.0, 1), (90.0, 2)].iter().enumerate() {
            let mut row = sample_row(n as u128);
            row.mock_interview_score = *interview;
            row.internships_completed = *internships;
            rows.push(row);
        }

        let criteria = EligibilityCriteria {
            min_mock_interview: Some(70.0),
            min_internships: Some(1),
            ..Default::default()
        };

        let matched: Vec<f64> = rows
            .iter()
            .filter(|r| criteria.matches(r))
            .map(|r| r.mock_interview_score)
            .collect();
        assert_eq!(matched, vec![75.0, 90.0]);
    }

    #[test]
    fn language_match_is_exact() {
        let criteria = EligibilityCriteria {
            programming_language: Some("Java".to_string()),
            ..Default::default()
        };

        let mut java = sample_row(1);
        java.language = "Java".to_string();
        let mut javascript = sample_row(2);
        javascript.language = "JavaScript".to_string();

        assert!(criteria.matches(&java));
        assert!(!criteria.matches(&javascript));
    }

    #[test]
    fn status_filter_uses_stored_labels() {
        let criteria = EligibilityCriteria {
            placement_status: Some(PlacementStatus::NotReady),
            ..Default::default()
        };

        let mut not_ready = sample_row(1);
        not_ready.placement_status = PlacementStatus::NotReady;
        assert!(criteria.matches(&not_ready));
        assert!(!criteria.matches(&sample_row(2)));
    }

    #[test]
    fn soft_skills_threshold_uses_full_precision_mean() {
        let criteria = EligibilityCriteria {
            min_soft_skills_avg: Some(75.0),
            ..Default::default()
        };

        let mut row = sample_row(1);
        row.communication = 80.0;
        row.teamwork = 70.0;
        row.presentation = 90.0;
        row.leadership = 60.0;
        row.critical_thinking = 100.0;
        row.interpersonal_skills = 50.0;
        assert!(criteria.matches(&row));

        row.interpersonal_skills = 49.0;
        assert!(!criteria.matches(&row));
    }

    #[test]
    fn out_of_range_threshold_is_rejected_before_querying() {
        let criteria = EligibilityCriteria {
            min_mock_interview: Some(150.0),
            ..Default::default()
        };
        assert_eq!(
            criteria.validate(),
            Err(CriteriaError::OutOfRange {
                field: "min_mock_interview",
                value: 150.0
            })
        );
    }

    #[test]
    fn negative_score_threshold_is_rejected() {
        let criteria = EligibilityCriteria {
            min_soft_skills_avg: Some(-1.0),
            ..Default::default()
        };
        assert!(matches!(
            criteria.validate(),
            Err(CriteriaError::OutOfRange { .. })
        ));
    }

    #[test]
    fn json_with_unknown_option_is_rejected() {
        let err = EligibilityCriteria::from_json(r#"{"max_age": 30}"#).unwrap_err();
        assert_eq!(err, CriteriaError::UnknownOption("max_age".to_string()));
    }

    #[test]
    fn json_with_non_numeric_threshold_is_rejected() {
        let err =
            EligibilityCriteria::from_json(r#"{"min_problems_solved": "lots"}"#).unwrap_err();
        assert!(matches!(err, CriteriaError::Malformed(_)));
    }

    #[test]
    fn json_with_negative_count_is_rejected() {
        let err = EligibilityCriteria::from_json(r#"{"min_internships": -2}"#).unwrap_err();
        assert!(matches!(err, CriteriaError::Malformed(_)));
    }

    #[test]
    fn json_round_trips_known_options() {
        let parsed = EligibilityCriteria::from_json(
            r#"{"min_problems_solved": 50, "programming_language": "Python", "placement_status": "Not Ready"}"#,
        )
        .unwrap();
        assert_eq!(parsed.min_problems_solved, Some(50));
        assert_eq!(parsed.programming_language.as_deref(), Some("Python"));
        assert_eq!(parsed.placement_status, Some(PlacementStatus::NotReady));
        assert_eq!(parsed.to_predicates().len(), 3);
    }
}
