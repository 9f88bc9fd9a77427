/// CRM Client — all reads and writes against the contact store.
///
/// `CrmApi` is the transport seam (HubSpot in production, an in-memory fake in
/// tests). The free functions below are what the orchestrator calls: they never
/// fail, they log and fall back to a safe default instead.
use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::activity_log::ActivityLog;

pub mod hubspot;
pub mod models;
pub mod personas;

pub use hubspot::HubSpotClient;
pub use models::{Contact, PersonaOption, PersonaUpdate};
pub use personas::PersonaCache;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

#[async_trait]
pub trait CrmApi: Send + Sync {
    /// Contacts with no persona, a job title, and no processed flag.
    async fn search_unprocessed(&self, limit: u32) -> Result<Vec<Contact>, CrmError>;

    async fn update_persona(&self, contact_id: &str, update: &PersonaUpdate) -> Result<(), CrmError>;

    /// Visible options of the CRM's persona enumeration.
    async fn persona_options(&self) -> Result<Vec<PersonaOption>, CrmError>;
}

/// Pulls up to `limit` unprocessed contacts. Errors are logged and yield an empty list.
pub async fn fetch_contacts(crm: &dyn CrmApi, log: &ActivityLog, limit: u32) -> Vec<Contact> {
    match crm.search_unprocessed(limit).await {
        Ok(contacts) => contacts,
        Err(e) => {
            log.error(format!("Error fetching contacts: {e}"));
            Vec::new()
        }
    }
}

/// Writes persona, confidence, processed flag and last-checked time.
/// `persona` is the enumeration value; `None` writes everything but the persona.
/// Returns whether the write succeeded; failures are logged, never raised.
pub async fn update_contact(
    crm: &dyn CrmApi,
    log: &ActivityLog,
    contact_id: &str,
    persona: Option<&str>,
    confidence: u8,
) -> bool {
    let update = PersonaUpdate {
        persona: persona.map(str::to_string),
        confidence,
        checked_at: Utc::now(),
    };

    match crm.update_persona(contact_id, &update).await {
        Ok(()) => {
            match persona {
                Some(persona) => log.info(format!(
                    "Contact {contact_id}: assigned {persona} ({confidence}%)"
                )),
                None => log.info(format!(
                    "Contact {contact_id}: marked processed without a persona"
                )),
            }
            true
        }
        Err(e) => {
            log.error(format!("Error updating contact {contact_id}: {e}"));
            false
        }
    }
}
