//! Department and agent selection.

use agent_chat::personas::{self, Department};
use anyhow::{bail, Result};
use colored::Colorize;
use console::Term;
use dialoguer::{theme::ColorfulTheme, Select};

/// The (department, agent) pair to open a session with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub department_id: String,
    pub agent_id: String,
}

/// Use the flags when both are given, otherwise prompt for what is missing.
pub fn choose(term: &Term, department: Option<String>, agent: Option<String>) -> Result<Selection> {
    let department = match department {
        Some(id) => match (Department::from_id(&id), agent) {
            // Any pair is accepted; unknown ones get the general assistant
            (_, Some(agent_id)) => {
                warn_if_unknown(&id, &agent_id);
                return Ok(Selection {
                    department_id: id,
                    agent_id,
                });
            }
            (Some(department), None) => department,
            (None, None) => bail!(
                "Unknown department '{}'. Expected one of: {}",
                id,
                department_ids().join(", ")
            ),
        },
        None => pick_department(term)?,
    };

    let agent_id = pick_agent(term, department)?;
    Ok(Selection {
        department_id: department.id().to_string(),
        agent_id,
    })
}

fn department_ids() -> Vec<&'static str> {
    Department::ALL.iter().map(|d| d.id()).collect()
}

fn warn_if_unknown(department_id: &str, agent_id: &str) {
    if personas::resolve(department_id, agent_id) == personas::FALLBACK_PERSONA {
        println!(
            "{}",
            format!(
                "No agent '{}' in '{}'; using the general assistant.",
                agent_id, department_id
            )
            .yellow()
        );
    }
}

fn pick_department(term: &Term) -> Result<Department> {
    let labels: Vec<&str> = Department::ALL.iter().map(|d| d.label()).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Which department?")
        .items(&labels)
        .default(0)
        .interact_on(term)?;

    Ok(Department::ALL[selection])
}

fn pick_agent(term: &Term, department: Department) -> Result<String> {
    let agents: Vec<_> = department.agents().collect();
    let titles: Vec<&str> = agents.iter().map(|entry| entry.title).collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Which {} agent?", department.label()))
        .items(&titles)
        .default(0)
        .interact_on(term)?;

    Ok(agents[selection].agent.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_flags_skip_prompts() {
        let term = Term::stdout();
        let selection = choose(&term, Some("legal".into()), Some("contracts".into())).unwrap();
        assert_eq!(
            selection,
            Selection {
                department_id: "legal".into(),
                agent_id: "contracts".into()
            }
        );
    }

    #[test]
    fn test_unknown_pair_is_accepted() {
        let term = Term::stdout();
        let selection = choose(&term, Some("sales".into()), Some("closer".into())).unwrap();
        assert_eq!(selection.department_id, "sales");
    }

    #[test]
    fn test_unknown_department_without_agent_is_an_error() {
        let term = Term::stdout();
        let err = choose(&term, Some("sales".into()), None).unwrap_err();
        assert!(err.to_string().contains("hr, finance, marketing, legal"));
    }
}
