pub mod certification;
pub mod education;
pub mod experience;
pub mod semantic;
pub mod skill;
pub mod text;

use std::sync::Arc;

use crate::orchestration::unit::AnalysisUnit;

/// The five analyzers every scoring run dispatches.
pub fn default_analyzers() -> Vec<Arc<dyn AnalysisUnit>> {
    vec![
        Arc::new(skill::SkillAnalyzer),
        Arc::new(experience::ExperienceAnalyzer),
        Arc::new(education::EducationAnalyzer),
        Arc::new(certification::CertificationAnalyzer),
        Arc::new(semantic::SemanticAnalyzer),
    ]
}
