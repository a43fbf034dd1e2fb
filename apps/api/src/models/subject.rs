use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Ordinal education level. Declaration order is the comparison order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl EducationLevel {
    pub fn rank(self) -> i32 {
        match self {
            EducationLevel::HighSchool => 1,
            EducationLevel::Associate => 2,
            EducationLevel::Bachelor => 3,
            EducationLevel::Master => 4,
            EducationLevel::Doctorate => 5,
        }
    }

    /// Parses the stored column value. Unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "high_school" | "highschool" | "ged" => Some(EducationLevel::HighSchool),
            "associate" | "associates" => Some(EducationLevel::Associate),
            "bachelor" | "bachelors" | "bs" | "ba" | "bsc" => Some(EducationLevel::Bachelor),
            "master" | "masters" | "ms" | "msc" | "mba" => Some(EducationLevel::Master),
            "doctorate" | "phd" | "doctoral" => Some(EducationLevel::Doctorate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub title: String,
    pub company: String,
    pub date_start: NaiveDate,
    /// `None` for a current position.
    pub date_end: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EducationItem {
    pub institution: String,
    pub level: EducationLevel,
    pub field: String,
    pub graduated_on: Option<NaiveDate>,
}

/// A parsed resume as the analyzers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub id: Uuid,
    pub candidate_name: String,
    pub raw_text: String,
    pub skills: Vec<String>,
    pub experience: Vec<ExperienceItem>,
    pub education: Vec<EducationItem>,
    pub certifications: Vec<String>,
    /// Reference date for open-ended positions, so scoring does not depend on the wall clock.
    pub as_of: NaiveDate,
}

/// A parsed job description as the analyzers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub min_years_experience: f64,
    pub max_years_experience: Option<f64>,
    pub required_education: Option<EducationLevel>,
    pub preferred_fields: Vec<String>,
    pub required_certifications: Vec<String>,
    pub preferred_certifications: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Database rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub candidate_name: String,
    pub raw_text: String,
    pub skills: Vec<String>,
    pub experience: Json<Vec<ExperienceItem>>,
    pub education: Json<Vec<EducationItem>>,
    pub certifications: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ResumeRow> for ResumeRecord {
    fn from(row: ResumeRow) -> Self {
        ResumeRecord {
            id: row.id,
            candidate_name: row.candidate_name,
            raw_text: row.raw_text,
            skills: row.skills,
            experience: row.experience.0,
            education: row.education.0,
            certifications: row.certifications,
            as_of: row.updated_at.date_naive(),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub min_years_experience: f64,
    pub max_years_experience: Option<f64>,
    pub required_education: Option<String>,
    pub preferred_fields: Vec<String>,
    pub required_certifications: Vec<String>,
    pub preferred_certifications: Vec<String>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        JobRecord {
            id: row.id,
            title: row.title,
            description: row.description,
            required_skills: row.required_skills,
            preferred_skills: row.preferred_skills,
            min_years_experience: row.min_years_experience,
            max_years_experience: row.max_years_experience,
            required_education: row
                .required_education
                .as_deref()
                .and_then(EducationLevel::parse),
            preferred_fields: row.preferred_fields,
            required_certifications: row.required_certifications,
            preferred_certifications: row.preferred_certifications,
        }
    }
}
