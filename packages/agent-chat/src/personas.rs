//! Agent context resolution.
//!
//! Each department agent is steered by a persona: the natural-language system
//! instruction sent alongside the transcript. Personas live in a static
//! table keyed by `{department}-{agent}`; unknown pairs get a generic
//! fallback. The table is read-only for the life of the process.

use serde::{Deserialize, Serialize};

/// Persona used for any (department, agent) pair missing from the table.
pub const FALLBACK_PERSONA: &str = "You are a helpful assistant.";

/// Departments that own agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Department {
    Hr,
    Finance,
    Marketing,
    Legal,
}

impl Department {
    pub const ALL: [Department; 4] = [
        Department::Hr,
        Department::Finance,
        Department::Marketing,
        Department::Legal,
    ];

    /// Identifier used in composite keys and URLs.
    pub fn id(&self) -> &'static str {
        match self {
            Department::Hr => "hr",
            Department::Finance => "finance",
            Department::Marketing => "marketing",
            Department::Legal => "legal",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Department::Hr => "HR",
            Department::Finance => "Finance",
            Department::Marketing => "Marketing",
            Department::Legal => "Legal",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.id() == id)
    }

    /// Catalogue entries belonging to this department, in table order.
    pub fn agents(&self) -> impl Iterator<Item = &'static PersonaEntry> + '_ {
        PERSONAS.iter().filter(move |e| e.department == *self)
    }
}

/// One row of the persona table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersonaEntry {
    pub key: &'static str,
    pub department: Department,
    pub agent: &'static str,
    pub title: &'static str,
    pub persona: &'static str,
}

static PERSONAS: &[PersonaEntry] = &[
    PersonaEntry {
        key: "hr-onboarding",
        department: Department::Hr,
        agent: "onboarding",
        title: "Employee Onboarding/Offboarding",
        persona: "You are an Employee Onboarding/Offboarding assistant. Help with collecting new hire data, checking policies, setting up accounts, and managing offboarding tasks.",
    },
    PersonaEntry {
        key: "hr-performance",
        department: Department::Hr,
        agent: "performance",
        title: "Performance Review",
        persona: "You are a Performance Review assistant. Help analyze feedback, identify themes, spot skill gaps, and suggest training plans.",
    },
    PersonaEntry {
        key: "finance-expenses",
        department: Department::Finance,
        agent: "expenses",
        title: "Expense Approval",
        persona: "You are an Expense Approval assistant. Review expenses for policy compliance, flag suspicious items, and streamline approvals.",
    },
    PersonaEntry {
        key: "finance-forecasting",
        department: Department::Finance,
        agent: "forecasting",
        title: "Financial Forecasting",
        persona: "You are a Financial Forecasting assistant. Help with financial modeling, predictions, and generating reports.",
    },
    PersonaEntry {
        key: "marketing-leads",
        department: Department::Marketing,
        agent: "leads",
        title: "Lead Qualification",
        persona: "You are a Lead Qualification assistant. Help score leads, analyze conversion data, and recommend follow-up actions.",
    },
    PersonaEntry {
        key: "marketing-content",
        department: Department::Marketing,
        agent: "content",
        title: "Content Generation",
        persona: "You are a Content Generation assistant. Create social media posts, emails, and blog outlines in the company's brand voice.",
    },
    PersonaEntry {
        key: "legal-contracts",
        department: Department::Legal,
        agent: "contracts",
        title: "Contract Drafting",
        persona: "You are a Contract Drafting assistant. Help create standard contract clauses, highlight risks, and ensure compliance.",
    },
    PersonaEntry {
        key: "legal-compliance",
        department: Department::Legal,
        agent: "compliance",
        title: "Compliance Check",
        persona: "You are a Compliance Check assistant. Cross-check policies with regulations and identify potential compliance issues.",
    },
];

/// Every persona in the table.
pub fn catalogue() -> &'static [PersonaEntry] {
    PERSONAS
}

/// Build the lookup key for a department and agent.
pub fn composite_key(department_id: &str, agent_id: &str) -> String {
    format!("{}-{}", department_id, agent_id)
}

/// Look up a persona by composite key, falling back to [`FALLBACK_PERSONA`].
pub fn resolve_key(key: &str) -> &'static str {
    PERSONAS
        .iter()
        .find(|e| e.key == key)
        .map(|e| e.persona)
        .unwrap_or(FALLBACK_PERSONA)
}

/// Resolve the persona for a department and agent. Total: never fails.
pub fn resolve(department_id: &str, agent_id: &str) -> &'static str {
    resolve_key(&composite_key(department_id, agent_id))
}

/// Greeting shown as the first assistant message of every session.
///
/// Uses the persona text before its first period. Personas without a period,
/// or with an abbreviation early on, produce odd greetings; kept as-is so the
/// greeting matches what users of the web front-end already see.
pub fn welcome_message(persona: &str) -> String {
    let first_sentence = persona.split('.').next().unwrap_or_default();
    format!("Hello! I'm your {}. How can I help you today?", first_sentence)
}
