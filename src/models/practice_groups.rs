use serde::{Deserialize, Serialize};

/// Firm practice groups a change can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PracticeGroup {
    CharterSchools,
    FacilitiesAndBusiness,
    Governance,
    Investigations,
    LaborAndEmployment,
    Litigation,
    Municipal,
    PublicFinance,
    SpecialEducation,
    Student,
    TitleIx,
}

impl PracticeGroup {
    /// All groups, in report ordering
    pub fn all() -> &'static [PracticeGroup] {
        &[
            PracticeGroup::CharterSchools,
            PracticeGroup::FacilitiesAndBusiness,
            PracticeGroup::Governance,
            PracticeGroup::Investigations,
            PracticeGroup::LaborAndEmployment,
            PracticeGroup::Litigation,
            PracticeGroup::Municipal,
            PracticeGroup::PublicFinance,
            PracticeGroup::SpecialEducation,
            PracticeGroup::Student,
            PracticeGroup::TitleIx,
        ]
    }

    /// Display name as used in prompts and reports
    pub fn name(self) -> &'static str {
        match self {
            PracticeGroup::CharterSchools => "Charter Schools",
            PracticeGroup::FacilitiesAndBusiness => "Facilities and Business",
            PracticeGroup::Governance => "Governance",
            PracticeGroup::Investigations => "Investigations",
            PracticeGroup::LaborAndEmployment => "Labor and Employment",
            PracticeGroup::Litigation => "Litigation",
            PracticeGroup::Municipal => "Municipal",
            PracticeGroup::PublicFinance => "Public Finance",
            PracticeGroup::SpecialEducation => "Special Education",
            PracticeGroup::Student => "Student",
            PracticeGroup::TitleIx => "Title IX",
        }
    }

    /// One-line description used when formatting prompts
    pub fn description(self) -> &'static str {
        match self {
            PracticeGroup::CharterSchools => {
                "Charter school petitions, renewals, oversight, and operations"
            }
            PracticeGroup::FacilitiesAndBusiness => {
                "School facilities, construction, procurement, developer fees, and business services"
            }
            PracticeGroup::Governance => {
                "Board governance, the Brown Act, conflicts of interest, and public records"
            }
            PracticeGroup::Investigations => {
                "Internal and administrative investigations of employees and programs"
            }
            PracticeGroup::LaborAndEmployment => {
                "Employee relations, collective bargaining, discipline, leaves, and wage-hour matters"
            }
            PracticeGroup::Litigation => {
                "Civil litigation, writs, claims, and administrative hearings"
            }
            PracticeGroup::Municipal => {
                "Cities, counties, and special districts as general counsel matters"
            }
            PracticeGroup::PublicFinance => {
                "Bonds, parcel taxes, developer fees, and other public financing"
            }
            PracticeGroup::SpecialEducation => {
                "Special education, IDEA, Section 504, and related student services"
            }
            PracticeGroup::Student => {
                "Student rights, discipline, attendance, privacy, and curriculum"
            }
            PracticeGroup::TitleIx => {
                "Title IX, sex discrimination, and harassment compliance"
            }
        }
    }

    /// Resolve a model-returned name against the catalog (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|g| g.name().to_lowercase() == wanted)
    }

    /// The catalog formatted as a prompt block, one group per line
    pub fn prompt_catalog() -> String {
        Self::all()
            .iter()
            .map(|g| format!("- {}: {}", g.name(), g.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for PracticeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
