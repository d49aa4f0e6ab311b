use serde::{Deserialize, Serialize};
use std::fmt;

/// The learner's current education track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationStatus {
    #[serde(rename = "Secondary School")]
    SecondarySchool,
    #[serde(rename = "JC")]
    Jc,
    /// The vocational track. Only these learners get the branch question.
    #[serde(rename = "Poly")]
    Poly,
}

impl EducationStatus {
    pub const ALL: [EducationStatus; 3] = [Self::SecondarySchool, Self::Jc, Self::Poly];

    /// Label used in prompts and snapshots ("Secondary School", "JC", "Poly").
    pub fn label(&self) -> &'static str {
        match self {
            Self::SecondarySchool => "Secondary School",
            Self::Jc => "JC",
            Self::Poly => "Poly",
        }
    }

    pub fn is_vocational(&self) -> bool {
        matches!(self, Self::Poly)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "secondary school" | "secondary" => Some(Self::SecondarySchool),
            "jc" => Some(Self::Jc),
            "poly" | "polytechnic" => Some(Self::Poly),
            _ => None,
        }
    }
}

impl fmt::Display for EducationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a vocational-track learner wants to do after graduating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BranchChoice {
    #[serde(rename = "Work")]
    Work,
    #[serde(rename = "Further study")]
    FurtherStudy,
}

impl BranchChoice {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::FurtherStudy => "Further study",
        }
    }

    /// Interpret a free-form branch answer. Anything that mentions neither
    /// work nor study is undecided.
    pub fn from_answer(raw: &str) -> Option<Self> {
        let val = raw.to_lowercase();
        if val.contains("work") {
            Some(Self::Work)
        } else if val.contains("uni") || val.contains("study") {
            Some(Self::FurtherStudy)
        } else {
            None
        }
    }
}

/// Which list of the catalog the Analysis stage draws its options from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionKind {
    /// `careers_poly_work`
    Careers,
    /// `courses_poly`
    PolyCourses,
    /// `uni_courses`
    UniCourses,
}

impl OptionKind {
    /// Catalog selection for a learner. The careers list is used exactly
    /// when [`is_work_path`] holds.
    pub fn for_profile(education: EducationStatus, branch: Option<BranchChoice>) -> Self {
        if is_work_path(education, branch) {
            return Self::Careers;
        }
        match education {
            EducationStatus::SecondarySchool => Self::PolyCourses,
            EducationStatus::Jc | EducationStatus::Poly => Self::UniCourses,
        }
    }

    pub fn is_careers(&self) -> bool {
        matches!(self, Self::Careers)
    }

    /// Catalog key holding this list.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            Self::Careers => "careers_poly_work",
            Self::PolyCourses => "courses_poly",
            Self::UniCourses => "uni_courses",
        }
    }

    /// Wording used in prompts: "careers" or "courses".
    pub fn noun(&self) -> &'static str {
        if self.is_careers() {
            "careers"
        } else {
            "courses"
        }
    }
}

/// The work-path predicate: vocational track and chose to enter the workforce.
///
/// Every caller that needs to know whether the careers catalog and the
/// salary/work-style gate lines apply goes through this function.
pub fn is_work_path(education: EducationStatus, branch: Option<BranchChoice>) -> bool {
    education.is_vocational() && branch == Some(BranchChoice::Work)
}

/// Profile facts collected at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub education: EducationStatus,
    /// Current course, required for the vocational track.
    pub vocational_course: Option<String>,
    /// Set once the branch question has been answered.
    pub branch: Option<BranchChoice>,
}

impl Profile {
    pub fn new(name: impl Into<String>, education: EducationStatus) -> Self {
        Self {
            name: name.into(),
            education,
            vocational_course: None,
            branch: None,
        }
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.vocational_course = Some(course.into());
        self
    }

    pub fn work_path(&self) -> bool {
        is_work_path(self.education, self.branch)
    }

    pub fn option_kind(&self) -> OptionKind {
        OptionKind::for_profile(self.education, self.branch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn work_path_only_for_poly_work() {
        assert!(is_work_path(EducationStatus::Poly, Some(BranchChoice::Work)));
        assert!(!is_work_path(EducationStatus::Poly, Some(BranchChoice::FurtherStudy)));
        assert!(!is_work_path(EducationStatus::Poly, None));
        assert!(!is_work_path(EducationStatus::Jc, Some(BranchChoice::Work)));
        assert!(!is_work_path(EducationStatus::SecondarySchool, Some(BranchChoice::Work)));
    }

    #[test]
    fn option_kind_agrees_with_work_path() {
        let branches = [None, Some(BranchChoice::Work), Some(BranchChoice::FurtherStudy)];
        for edu in EducationStatus::ALL {
            for branch in branches {
                assert_eq!(
                    OptionKind::for_profile(edu, branch).is_careers(),
                    is_work_path(edu, branch),
                    "{:?} / {:?}",
                    edu,
                    branch
                );
            }
        }
    }

    #[test]
    fn course_lists_per_track() {
        assert_eq!(
            OptionKind::for_profile(EducationStatus::SecondarySchool, None),
            OptionKind::PolyCourses
        );
        assert_eq!(OptionKind::for_profile(EducationStatus::Jc, None), OptionKind::UniCourses);
        assert_eq!(
            OptionKind::for_profile(EducationStatus::Poly, Some(BranchChoice::FurtherStudy)),
            OptionKind::UniCourses
        );
    }

    #[test]
    fn branch_answer_parsing() {
        assert_eq!(BranchChoice::from_answer("Work"), Some(BranchChoice::Work));
        assert_eq!(BranchChoice::from_answer("I want to WORK"), Some(BranchChoice::Work));
        assert_eq!(BranchChoice::from_answer("Go to uni"), Some(BranchChoice::FurtherStudy));
        assert_eq!(BranchChoice::from_answer("keep studying"), Some(BranchChoice::FurtherStudy));
        assert_eq!(BranchChoice::from_answer("not sure"), None);
    }

    #[test]
    fn education_status_wire_names() {
        let json = serde_json::to_string(&EducationStatus::SecondarySchool).unwrap();
        assert_eq!(json, "\"Secondary School\"");
        let parsed: EducationStatus = serde_json::from_str("\"Poly\"").unwrap();
        assert_eq!(parsed, EducationStatus::Poly);
        assert_eq!(EducationStatus::parse(" jc "), Some(EducationStatus::Jc));
    }
}
