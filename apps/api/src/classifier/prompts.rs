// Prompt constants for persona classification.

/// Personas offered to the model when the CRM enumeration is unavailable.
pub const DEFAULT_PERSONAS: [&str; 5] = [
    "Architect Alex",
    "Designer Dani",
    "Developer Drew",
    "Executive Ezra",
    "Contractor Chris",
];

/// Catch-all label used for every fallback. Offered with the default list,
/// and with a CRM list only when the enumeration has it.
pub const UNKNOWN_PERSONA: &str = "Unknown";

pub const CLASSIFY_SYSTEM: &str =
    "You are a helpful assistant that classifies CRM contacts into buyer personas. \
    Answer with exactly one persona name from the list you are given. \
    Do NOT add punctuation, explanations, or any other text.";

/// Classification prompt template. Replace `{job_title}`, `{company}` and
/// `{persona_list}` (one `- Name` line per persona) before sending.
pub const CLASSIFY_PROMPT_TEMPLATE: &str = r#"Given the job title "{job_title}" at the company "{company}", which of the following personas best applies?
{persona_list}

Only return the persona name."#;
