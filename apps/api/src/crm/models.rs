use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// HubSpot contact property names read and written by the service.
pub const PROP_FIRST_NAME: &str = "firstname";
pub const PROP_LAST_NAME: &str = "lastname";
pub const PROP_JOB_TITLE: &str = "jobtitle";
pub const PROP_COMPANY: &str = "company";
pub const PROP_PERSONA: &str = "persona";
pub const PROP_CONFIDENCE: &str = "ai_persona_confidence";
pub const PROP_PROCESSED: &str = "ai_persona_processed";
pub const PROP_LAST_CHECKED: &str = "ai_persona_last_checked";

/// Properties requested on every contact search.
pub const CONTACT_PROPERTIES: [&str; 8] = [
    PROP_FIRST_NAME,
    PROP_LAST_NAME,
    PROP_JOB_TITLE,
    PROP_COMPANY,
    PROP_PERSONA,
    PROP_CONFIDENCE,
    PROP_PROCESSED,
    PROP_LAST_CHECKED,
];

/// A CRM contact, reduced to the properties this service cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contact {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub persona: Option<String>,
    pub confidence: Option<u8>,
    pub processed: bool,
    pub last_checked: Option<DateTime<Utc>>,
}

impl Contact {
    /// Job title and company, both trimmed, when both are present and non-blank.
    pub fn classification_input(&self) -> Option<(&str, &str)> {
        let job_title = non_blank(self.job_title.as_deref())?;
        let company = non_blank(self.company.as_deref())?;
        Some((job_title, company))
    }

    /// "First Last", or `None` when neither name is set.
    pub fn display_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .filter_map(non_blank)
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }

    /// True once a persona has been stored or the processed flag is set.
    pub fn is_already_processed(&self) -> bool {
        self.processed || non_blank(self.persona.as_deref()).is_some()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Contact object as returned by the HubSpot CRM v3 API.
/// Every property value is a nullable string.
#[derive(Debug, Deserialize)]
pub struct HubSpotContact {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Option<String>>,
}

impl HubSpotContact {
    fn prop(&self, name: &str) -> Option<String> {
        self.properties.get(name).cloned().flatten()
    }
}

impl From<HubSpotContact> for Contact {
    fn from(raw: HubSpotContact) -> Self {
        let processed = raw
            .prop(PROP_PROCESSED)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        let confidence = raw
            .prop(PROP_CONFIDENCE)
            .and_then(|v| v.trim().parse::<u8>().ok());
        let last_checked = raw
            .prop(PROP_LAST_CHECKED)
            .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Contact {
            first_name: raw.prop(PROP_FIRST_NAME),
            last_name: raw.prop(PROP_LAST_NAME),
            job_title: raw.prop(PROP_JOB_TITLE),
            company: raw.prop(PROP_COMPANY),
            persona: raw.prop(PROP_PERSONA),
            confidence,
            processed,
            last_checked,
            id: raw.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<HubSpotContact>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub filter_groups: Vec<FilterGroup<'a>>,
    pub sorts: Vec<&'a str>,
    pub properties: Vec<&'a str>,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct FilterGroup<'a> {
    pub filters: Vec<Filter<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter<'a> {
    pub property_name: &'a str,
    pub operator: &'a str,
}

impl<'a> SearchRequest<'a> {
    /// Contacts with no persona, a job title, and no processed flag.
    pub fn unprocessed(limit: u32) -> Self {
        SearchRequest {
            filter_groups: vec![FilterGroup {
                filters: vec![
                    Filter {
                        property_name: PROP_PERSONA,
                        operator: "NOT_HAS_PROPERTY",
                    },
                    Filter {
                        property_name: PROP_JOB_TITLE,
                        operator: "HAS_PROPERTY",
                    },
                    Filter {
                        property_name: PROP_PROCESSED,
                        operator: "NOT_HAS_PROPERTY",
                    },
                ],
            }],
            sorts: vec![],
            properties: CONTACT_PROPERTIES.to_vec(),
            limit,
        }
    }
}

/// Values written back after classification.
///
/// `persona` is the enumeration's internal value. `None` leaves the persona
/// property untouched and only marks the contact as checked.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaUpdate {
    pub persona: Option<String>,
    pub confidence: u8,
    pub checked_at: DateTime<Utc>,
}

impl PersonaUpdate {
    /// PATCH body for `/crm/v3/objects/contacts/{id}`.
    pub fn to_properties(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        if let Some(persona) = &self.persona {
            properties.insert(PROP_PERSONA.into(), persona.clone().into());
        }
        properties.insert(PROP_CONFIDENCE.into(), self.confidence.to_string().into());
        properties.insert(PROP_PROCESSED.into(), "true".into());
        properties.insert(PROP_LAST_CHECKED.into(), self.checked_at.to_rfc3339().into());
        serde_json::json!({ "properties": properties })
    }
}

/// One option of the persona enumeration: the label users see and the
/// internal value stored on the contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaOption {
    pub label: String,
    pub value: String,
}

impl PersonaOption {
    /// An option whose stored value is its label.
    pub fn plain(label: &str) -> Self {
        PersonaOption {
            label: label.to_string(),
            value: label.to_string(),
        }
    }
}

/// Definition of an enumeration contact property.
#[derive(Debug, Deserialize)]
pub struct PropertyDefinition {
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyOption {
    pub label: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub hidden: bool,
}

impl PropertyDefinition {
    /// Visible options in CRM display order. An option without a value
    /// stores its label.
    pub fn visible_options(self) -> Vec<PersonaOption> {
        self.options
            .into_iter()
            .filter(|o| !o.hidden)
            .filter_map(|o| {
                let label = o.label.trim();
                if label.is_empty() {
                    return None;
                }
                let value = match o.value.trim() {
                    "" => label,
                    value => value,
                };
                Some(PersonaOption {
                    label: label.to_string(),
                    value: value.to_string(),
                })
            })
            .collect()
    }
}
