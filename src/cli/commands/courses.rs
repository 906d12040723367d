//! Courses command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// List indexed courses, or print one course's outline.
pub async fn run_courses(outline: Option<String>, settings: Settings) -> Result<()> {
    preflight::check(operation_for(outline.as_deref()))?;

    let orchestrator = Orchestrator::new(&settings)?;

    if let Some(name) = outline {
        let text = orchestrator.outline(&name).await?;
        println!("{}", text);
        return Ok(());
    }

    let analytics = orchestrator.course_analytics().await?;
    if analytics.total_courses == 0 {
        Output::info("No courses indexed yet. Use 'syllabus load <path>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Courses ({})", analytics.total_courses));
    for title in &analytics.course_titles {
        Output::list_item(title);
    }

    Ok(())
}

fn operation_for(outline: Option<&str>) -> Operation {
    match outline {
        Some(_) => Operation::Outline,
        None => Operation::Browse,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_lookup_checks_api_key() {
        assert!(matches!(operation_for(Some("rust")), Operation::Outline));
        assert!(matches!(operation_for(None), Operation::Browse));
    }
}
