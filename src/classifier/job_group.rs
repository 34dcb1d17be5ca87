//! Job-group detection and ambiguous-transit return probabilities
//!
//! Each job group carries its own prior that a long corridor stay ends in a
//! return to work. The prior feeds a monotonic duration curve that saturates
//! near 0.99 once the stay passes two hours.

use crate::types::JobGroup;

/// Korean keywords match anywhere (department names are compounds such as
/// 생산1팀); English keywords must match a whole word.
struct Keywords {
    korean: &'static [&'static str],
    english: &'static [&'static str],
}

impl Keywords {
    fn matches(&self, text: &str) -> bool {
        contains_any(text, self.korean)
            || text
                .split(|c: char| !(c.is_alphanumeric() || c == '&'))
                .any(|word| self.english.contains(&word))
    }
}

const MANAGEMENT_POSITION: Keywords = Keywords {
    korean: &["팀장", "부장", "이사", "임원", "대표"],
    english: &["manager", "director", "head", "executive"],
};

const PRODUCTION_DEPARTMENT: Keywords = Keywords {
    korean: &["생산", "제조", "공정", "설비", "유틸리티", "엔지니어링"],
    english: &["production", "manufacturing", "facility", "facilities", "utility", "utilities"],
};

const RESEARCH_DEPARTMENT: Keywords = Keywords {
    korean: &["연구", "개발", "품질", "분석", "실험"],
    english: &["research", "r&d", "qc", "quality", "laboratory", "lab"],
};

const TWO_SHIFT_MARKERS: &[&str] = &["2교대", "two-shift", "2-shift"];

/// Classifies employees into job groups from organizational attributes
pub struct JobGroupClassifier;

impl JobGroupClassifier {
    /// Position is checked first (management), then department keywords,
    /// then the shift pattern. Everything else is office work.
    pub fn classify(department: &str, position: &str, shift_type: &str) -> JobGroup {
        let department = department.to_lowercase();
        let position = position.to_lowercase();
        let shift_type = shift_type.to_lowercase();

        if MANAGEMENT_POSITION.matches(&position) {
            return JobGroup::Management;
        }
        if PRODUCTION_DEPARTMENT.matches(&department) {
            return JobGroup::Production;
        }
        if RESEARCH_DEPARTMENT.matches(&department) {
            return JobGroup::Research;
        }
        if contains_any(&shift_type, TWO_SHIFT_MARKERS) {
            return JobGroup::Production;
        }
        JobGroup::Office
    }
}

impl JobGroup {
    /// Prior probability that an ambiguous transit ends in a return to work
    pub fn default_return_probability(&self) -> f64 {
        match self {
            JobGroup::Production => 0.95,
            JobGroup::Research => 0.85,
            JobGroup::Office => 0.80,
            JobGroup::Management => 0.75,
        }
    }

    /// Duration-dependent return probability; non-decreasing in `minutes`
    pub fn return_probability(&self, minutes: i64) -> f64 {
        let base = self.default_return_probability();
        match minutes {
            m if m < 5 => base,
            // tiers never fall below the prior, so high-prior groups stay flat
            m if m < 15 => (base * 1.05).min(0.90).max(base),
            m if m < 30 => (base * 1.10).min(0.92).max(base),
            m if m < 60 => (base * 1.15).min(0.95).max(base),
            m if m < 90 => 0.95,
            m if m < 120 => 0.98,
            _ => 0.99,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobGroup::Production => "production",
            JobGroup::Research => "research",
            JobGroup::Office => "office",
            JobGroup::Management => "management",
        }
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
