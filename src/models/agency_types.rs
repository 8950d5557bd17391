use serde::{Deserialize, Serialize};

/// Types of California local public agencies considered by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgencyType {
    SchoolDistrict,
    CountyOfficeOfEducation,
    CommunityCollegeDistrict,
    City,
    County,
    SpecialDistrict,
    CharterSchool,
    JointPowersAuthority,
}

impl AgencyType {
    pub fn all() -> &'static [AgencyType] {
        &[
            AgencyType::SchoolDistrict,
            AgencyType::CountyOfficeOfEducation,
            AgencyType::CommunityCollegeDistrict,
            AgencyType::City,
            AgencyType::County,
            AgencyType::SpecialDistrict,
            AgencyType::CharterSchool,
            AgencyType::JointPowersAuthority,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            AgencyType::SchoolDistrict => "School District",
            AgencyType::CountyOfficeOfEducation => "County Office of Education",
            AgencyType::CommunityCollegeDistrict => "Community College District",
            AgencyType::City => "City",
            AgencyType::County => "County",
            AgencyType::SpecialDistrict => "Special District",
            AgencyType::CharterSchool => "Charter School",
            AgencyType::JointPowersAuthority => "Joint Powers Authority / SELPA",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            AgencyType::SchoolDistrict => "K-12 public school districts",
            AgencyType::CountyOfficeOfEducation => {
                "County offices of education and county boards of education"
            }
            AgencyType::CommunityCollegeDistrict => "Community college districts",
            AgencyType::City => "General law and charter cities",
            AgencyType::County => "Counties and county agencies",
            AgencyType::SpecialDistrict => {
                "Water, fire, recreation, and other special districts"
            }
            AgencyType::CharterSchool => "Charter schools and charter management organizations",
            AgencyType::JointPowersAuthority => {
                "Joint powers authorities and special education local plan areas"
            }
        }
    }

    /// The catalog formatted as a prompt block
    pub fn prompt_catalog() -> String {
        Self::all()
            .iter()
            .map(|a| format!("- {}: {}", a.name(), a.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Display for AgencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
