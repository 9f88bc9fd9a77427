//! Classifier — maps a job title and company onto one buyer persona.
//!
//! The model's reply is treated as a bare label. Anything outside the allowed
//! list becomes "Unknown", as does a failed call. Every fallback carries zero
//! confidence and the reason it happened. `classify` never returns an error.

use std::sync::Arc;

use rand::Rng;

use crate::crm::PersonaOption;
use crate::llm_client::CompletionModel;

pub mod prompts;

use prompts::{CLASSIFY_PROMPT_TEMPLATE, CLASSIFY_SYSTEM, DEFAULT_PERSONAS, UNKNOWN_PERSONA};

/// Source of the confidence score attached to a successful classification.
/// The completion API gives no calibrated score, so this is a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidencePolicy {
    Fixed(u8),
    /// Uniform over `min..=max`.
    Random { min: u8, max: u8 },
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        ConfidencePolicy::Random { min: 80, max: 100 }
    }
}

impl ConfidencePolicy {
    fn sample(&self) -> u8 {
        match *self {
            ConfidencePolicy::Fixed(value) => value,
            ConfidencePolicy::Random { min, max } if min >= max => min,
            ConfidencePolicy::Random { min, max } => rand::thread_rng().gen_range(min..=max),
        }
    }
}

/// Why a classification fell back to "Unknown".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// The completion call failed.
    Failed(String),
    /// The reply was blank or named no offered persona.
    Unmatched(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Canonical persona label.
    pub persona: String,
    /// Enumeration value to store. `None` when the result is "Unknown" and
    /// the CRM enumeration has no such option.
    pub value: Option<String>,
    pub confidence: u8,
    pub fallback: Option<Fallback>,
}

impl Classification {
    fn matched(option: &PersonaOption, confidence: u8) -> Self {
        Classification {
            persona: option.label.clone(),
            value: Some(option.value.clone()),
            confidence,
            fallback: None,
        }
    }

    /// "Unknown" with zero confidence, stored as the enumeration's own
    /// Unknown value when `allowed` is given.
    pub fn unknown(allowed: Option<&[PersonaOption]>, fallback: Fallback) -> Self {
        let value = match allowed {
            Some(list) => find_label(list, UNKNOWN_PERSONA).map(|o| o.value.clone()),
            None => Some(UNKNOWN_PERSONA.to_string()),
        };
        Classification {
            persona: UNKNOWN_PERSONA.to_string(),
            value,
            confidence: 0,
            fallback: Some(fallback),
        }
    }
}

#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn CompletionModel>,
    confidence: ConfidencePolicy,
}

impl Classifier {
    pub fn new(model: Arc<dyn CompletionModel>, confidence: ConfidencePolicy) -> Self {
        Self { model, confidence }
    }

    /// Asks the model for the best-fitting persona.
    ///
    /// `allowed_personas` constrains both the prompt and the accepted answers;
    /// replies are matched on option labels. `None` (or an empty list) offers
    /// the default personas and accepts the reply as-is.
    pub async fn classify(
        &self,
        job_title: &str,
        company: &str,
        allowed_personas: Option<&[PersonaOption]>,
    ) -> Classification {
        let allowed = allowed_personas.filter(|list| !list.is_empty());
        let prompt = build_prompt(job_title, company, allowed);

        let raw = match self.model.complete(CLASSIFY_SYSTEM, &prompt).await {
            Ok(text) => text,
            Err(e) => return Classification::unknown(allowed, Fallback::Failed(e.to_string())),
        };

        let label = reply_label(&raw);
        if label.is_empty() {
            return Classification::unknown(allowed, Fallback::Unmatched(String::new()));
        }

        match allowed {
            Some(list) => match find_label(list, label) {
                Some(option) => Classification::matched(option, self.confidence.sample()),
                None => Classification::unknown(allowed, Fallback::Unmatched(label.to_string())),
            },
            None => Classification::matched(&PersonaOption::plain(label), self.confidence.sample()),
        }
    }
}

fn find_label<'a>(list: &'a [PersonaOption], label: &str) -> Option<&'a PersonaOption> {
    list.iter().find(|o| o.label.trim().eq_ignore_ascii_case(label))
}

/// Fills the prompt template. "Unknown", when offered, comes last.
fn build_prompt(job_title: &str, company: &str, allowed: Option<&[PersonaOption]>) -> String {
    let (mut personas, offer_unknown): (Vec<&str>, bool) = match allowed {
        Some(list) => (
            list.iter().map(|o| o.label.trim()).collect(),
            find_label(list, UNKNOWN_PERSONA).is_some(),
        ),
        None => (DEFAULT_PERSONAS.to_vec(), true),
    };
    personas.retain(|p| !p.eq_ignore_ascii_case(UNKNOWN_PERSONA));
    if offer_unknown {
        personas.push(UNKNOWN_PERSONA);
    }

    let persona_list = personas
        .iter()
        .map(|p| format!("- {p}"))
        .collect::<Vec<_>>()
        .join("\n");

    CLASSIFY_PROMPT_TEMPLATE
        .replace("{job_title}", job_title.trim())
        .replace("{company}", company.trim())
        .replace("{persona_list}", &persona_list)
}

/// First non-blank line of the reply without surrounding quotes or a
/// trailing period. Empty when the reply has no text.
fn reply_label(raw: &str) -> &str {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c| matches!(c, '"' | '\'' | '`'))
        .trim_end_matches('.')
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeModel;

    fn allowed(list: &[&str]) -> Vec<PersonaOption> {
        list.iter().map(|s| PersonaOption::plain(s)).collect()
    }

    fn classifier(model: FakeModel) -> Classifier {
        Classifier::new(Arc::new(model), ConfidencePolicy::Fixed(90))
    }

    #[tokio::test]
    async fn test_senior_architect_maps_to_architect_alex() {
        let personas = allowed(&["Architect Alex", "Designer Dani", "Unknown"]);
        let result = classifier(FakeModel::replying("Architect Alex"))
            .classify("Senior Architect", "Foster & Partners", Some(personas.as_slice()))
            .await;
        assert_eq!(result.persona, "Architect Alex");
        assert_eq!(result.value.as_deref(), Some("Architect Alex"));
        assert_eq!(result.confidence, 90);
        assert_eq!(result.fallback, None);
    }

    #[tokio::test]
    async fn test_match_on_label_returns_enumeration_value() {
        let personas = vec![
            PersonaOption {
                label: "Architect Alex".into(),
                value: "architect_alex".into(),
            },
            PersonaOption {
                label: "Unknown".into(),
                value: "unknown".into(),
            },
        ];
        let result = classifier(FakeModel::replying("architect alex"))
            .classify("Senior Architect", "Foster & Partners", Some(personas.as_slice()))
            .await;
        assert_eq!(result.persona, "Architect Alex");
        assert_eq!(result.value.as_deref(), Some("architect_alex"));

        let unknown = classifier(FakeModel::replying("Procurement Pat"))
            .classify("Buyer", "Acme", Some(personas.as_slice()))
            .await;
        assert_eq!(unknown.value.as_deref(), Some("unknown"));
    }

    #[tokio::test]
    async fn test_out_of_list_reply_becomes_unknown() {
        let personas = allowed(&["Architect Alex", "Designer Dani", "Unknown"]);
        let result = classifier(FakeModel::replying("Procurement Pat"))
            .classify("Buyer", "Acme", Some(personas.as_slice()))
            .await;
        assert_eq!(result.persona, "Unknown");
        assert_eq!(result.confidence, 0);
        assert_eq!(
            result.fallback,
            Some(Fallback::Unmatched("Procurement Pat".into()))
        );
    }

    #[tokio::test]
    async fn test_unknown_has_no_value_outside_enumeration() {
        let personas = allowed(&["Architect Alex", "Designer Dani"]);
        let result = classifier(FakeModel::replying("Unknown"))
            .classify("Buyer", "Acme", Some(personas.as_slice()))
            .await;
        assert_eq!(result.persona, "Unknown");
        assert_eq!(result.value, None);
        assert_eq!(result.confidence, 0);
    }

    #[tokio::test]
    async fn test_reply_used_verbatim_without_allowed_list() {
        let result = classifier(FakeModel::replying("  Procurement Pat \n"))
            .classify("Buyer", "Acme", None)
            .await;
        assert_eq!(result.persona, "Procurement Pat");
        assert_eq!(result.value.as_deref(), Some("Procurement Pat"));
        assert_eq!(result.confidence, 90);
    }

    #[tokio::test]
    async fn test_api_failure_yields_unknown_zero() {
        let result = classifier(FakeModel::failing())
            .classify("Senior Architect", "Foster & Partners", None)
            .await;
        assert_eq!(result.persona, "Unknown");
        assert_eq!(result.value.as_deref(), Some("Unknown"));
        assert_eq!(result.confidence, 0);
        assert!(matches!(
            result.fallback,
            Some(Fallback::Failed(ref e)) if e.contains("invalid api key")
        ));
    }

    #[tokio::test]
    async fn test_blank_reply_yields_unknown_zero() {
        let result = classifier(FakeModel::replying("  \n\"\" "))
            .classify("Buyer", "Acme", None)
            .await;
        assert_eq!(result.persona, "Unknown");
        assert_eq!(result.confidence, 0);
        assert_eq!(result.fallback, Some(Fallback::Unmatched(String::new())));
    }

    #[tokio::test]
    async fn test_prompt_lists_allowed_personas() {
        let model = Arc::new(FakeModel::replying("Developer Drew"));
        let classifier = Classifier::new(model.clone(), ConfidencePolicy::Fixed(85));
        let personas = allowed(&["Developer Drew", "Unknown", "Executive Ezra"]);

        classifier
            .classify("Staff Engineer", "Initech", Some(personas.as_slice()))
            .await;

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        let (system, prompt) = &prompts[0];
        assert_eq!(system, CLASSIFY_SYSTEM);
        assert!(prompt.contains(r#"job title "Staff Engineer""#));
        assert!(prompt.contains(r#"company "Initech""#));
        assert!(prompt.contains("- Developer Drew\n- Executive Ezra\n- Unknown"));
        assert!(!prompt.contains("Architect Alex"));
    }

    #[test]
    fn test_unknown_not_offered_when_enumeration_lacks_it() {
        let personas = allowed(&["Developer Drew", "Executive Ezra"]);
        let prompt = build_prompt("CTO", "Initech", Some(personas.as_slice()));
        assert!(prompt.contains("- Developer Drew\n- Executive Ezra\n\n"));
        assert!(!prompt.contains("Unknown"));
    }

    #[test]
    fn test_default_prompt_has_five_personas_plus_unknown() {
        let prompt = build_prompt("CEO", "Acme", None);
        for persona in DEFAULT_PERSONAS {
            assert!(prompt.contains(&format!("- {persona}")));
        }
        assert_eq!(prompt.matches("- Unknown").count(), 1);
        assert_eq!(prompt.lines().filter(|l| l.starts_with("- ")).count(), 6);
    }

    #[test]
    fn test_unknown_not_duplicated_from_crm_list() {
        let personas = allowed(&["Unknown", "Designer Dani"]);
        let prompt = build_prompt("Designer", "Studio", Some(personas.as_slice()));
        assert_eq!(prompt.matches("- Unknown").count(), 1);
        assert!(prompt.ends_with("Only return the persona name."));
    }

    #[test]
    fn test_reply_label_strips_quotes_and_punctuation() {
        assert_eq!(reply_label("\"designer dani.\""), "designer dani");
        assert_eq!(
            reply_label("\nArchitect Alex\nBecause they design buildings."),
            "Architect Alex"
        );
        assert_eq!(reply_label("   \n  "), "");
    }

    #[tokio::test]
    async fn test_case_insensitive_match_returns_canonical_label() {
        let personas = allowed(&["Architect Alex", "Designer Dani"]);
        let result = classifier(FakeModel::replying("'designer dani.'"))
            .classify("Designer", "Studio", Some(personas.as_slice()))
            .await;
        assert_eq!(result.persona, "Designer Dani");
    }

    #[tokio::test]
    async fn test_empty_allowed_list_falls_back_to_defaults() {
        let model = Arc::new(FakeModel::replying("Contractor Chris"));
        let classifier = Classifier::new(model.clone(), ConfidencePolicy::Fixed(80));

        let no_personas: Vec<PersonaOption> = Vec::new();
        let result = classifier
            .classify("Builder", "BuildCo", Some(no_personas.as_slice()))
            .await;

        assert_eq!(result.persona, "Contractor Chris");
        assert!(model.prompts()[0].1.contains("- Architect Alex"));
    }

    #[test]
    fn test_random_confidence_in_range() {
        let policy = ConfidencePolicy::default();
        for _ in 0..500 {
            let value = policy.sample();
            assert!((80..=100).contains(&value));
        }
    }

    #[test]
    fn test_degenerate_random_range() {
        assert_eq!(ConfidencePolicy::Random { min: 95, max: 90 }.sample(), 95);
    }
}
