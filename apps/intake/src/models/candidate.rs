use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api_client::wire::ApplicationRecord;

/// Pipeline stage of a (candidate, job application) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    InitialScreening,
    FinalScreening,
    Rejected,
    RejectedByHr,
    NotSelected,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::InitialScreening => "initial_screening",
            CandidateStatus::FinalScreening => "final_screening",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::RejectedByHr => "rejected_by_hr",
            CandidateStatus::NotSelected => "not_selected",
        }
    }

    /// Ordering weight used by the final-screening list.
    pub fn priority(&self) -> u8 {
        match self {
            CandidateStatus::FinalScreening => 3,
            CandidateStatus::InitialScreening => 2,
            CandidateStatus::RejectedByHr => 1,
            CandidateStatus::Rejected | CandidateStatus::NotSelected => 0,
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial_screening" => Ok(CandidateStatus::InitialScreening),
            "final_screening" => Ok(CandidateStatus::FinalScreening),
            "rejected" => Ok(CandidateStatus::Rejected),
            "rejected_by_hr" => Ok(CandidateStatus::RejectedByHr),
            "not_selected" => Ok(CandidateStatus::NotSelected),
            other => Err(format!("unknown candidate status '{other}'")),
        }
    }
}

/// Composite `(candidate_id, job_id)` identity; the unit of change tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirtyKey {
    pub candidate_id: u64,
    pub job_id: u64,
}

impl DirtyKey {
    pub fn new(candidate_id: u64, job_id: u64) -> Self {
        Self {
            candidate_id,
            job_id,
        }
    }
}

impl fmt::Display for DirtyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.candidate_id, self.job_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub technical: f64,
    pub experience: f64,
    pub cultural: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceItem {
    pub title: String,
    pub company: String,
    pub duration: String,
    pub location: String,
    pub description: String,
}

/// A candidate as the screening views see it. Only `status` is ever changed
/// client-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub candidate_id: u64,
    pub application_id: u64,
    #[serde(rename = "jobId")]
    pub job_id: u64,
    pub name: String,
    pub status: CandidateStatus,
    pub score: f64,
    pub recommendation: String,
    pub role: String,
    pub breakdown: ScoreBreakdown,
    pub summary: String,
    pub skills: String,
    #[serde(rename = "experienceList")]
    pub experience_list: Vec<ExperienceItem>,
}

impl Candidate {
    pub fn key(&self) -> DirtyKey {
        DirtyKey::new(self.candidate_id, self.job_id)
    }
}

impl From<ApplicationRecord> for Candidate {
    fn from(record: ApplicationRecord) -> Self {
        let status = record.status.parse().unwrap_or_else(|e| {
            warn!(
                application_id = record.application_id,
                "{e}, defaulting to initial_screening"
            );
            CandidateStatus::InitialScreening
        });

        let candidate = record.candidate;
        let skills = format!(
            "{}{}",
            candidate.technical_skills.unwrap_or_default(),
            candidate.soft_skills.unwrap_or_default()
        );
        let experience_list = candidate
            .work_experiences
            .into_iter()
            .map(|exp| ExperienceItem {
                title: exp.role,
                company: exp.company_name,
                duration: format!(
                    "{} - {}",
                    exp.start_year.map(|y| y.to_string()).unwrap_or_default(),
                    exp.end_year
                        .map(|y| y.to_string())
                        .unwrap_or_else(|| "Present".to_string())
                ),
                location: String::new(),
                description: exp.summary.unwrap_or_default(),
            })
            .collect();

        Candidate {
            candidate_id: candidate.candidate_id,
            application_id: record.application_id,
            job_id: record.job.job_id,
            name: candidate.name,
            status,
            score: record.score.unwrap_or(0.0),
            recommendation: record.ai_recommendation.unwrap_or_default(),
            role: record.job.role,
            breakdown: ScoreBreakdown {
                technical: record.technical_score.unwrap_or(0.0),
                experience: record.experience_score.unwrap_or(0.0),
                cultural: record.cultural_score.unwrap_or(0.0),
            },
            summary: candidate.summary.unwrap_or_default(),
            skills,
            experience_list,
        }
    }
}
