//! In-memory stand-ins for the CRM and the completion API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::crm::{Contact, CrmApi, CrmError, PersonaOption, PersonaUpdate};
use crate::llm_client::{CompletionModel, LlmError};

/// Fake CRM. Search returns every seeded contact (up to the limit) so that the
/// orchestrator's own skip rules are exercised.
#[derive(Default)]
pub struct FakeCrm {
    contacts: Vec<Contact>,
    personas: Option<Vec<PersonaOption>>,
    fail_search: bool,
    fail_updates: bool,
    pub search_limits: Mutex<Vec<u32>>,
    pub persona_calls: AtomicUsize,
    updates: Mutex<Vec<(String, PersonaUpdate)>>,
}

impl FakeCrm {
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts,
            ..Default::default()
        }
    }

    pub fn contact(id: &str, job_title: &str, company: &str) -> Contact {
        Contact {
            id: id.to_string(),
            job_title: Some(job_title.to_string()),
            company: Some(company.to_string()),
            ..Default::default()
        }
    }

    /// Enumeration whose stored values equal the labels.
    pub fn with_personas(mut self, personas: &[&str]) -> Self {
        self.personas = Some(personas.iter().map(|p| PersonaOption::plain(p)).collect());
        self
    }

    /// Enumeration from `(label, value)` pairs.
    pub fn with_persona_options(mut self, options: &[(&str, &str)]) -> Self {
        self.personas = Some(
            options
                .iter()
                .map(|(label, value)| PersonaOption {
                    label: label.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn updates(&self) -> Vec<(String, PersonaUpdate)> {
        self.updates.lock().unwrap().clone()
    }

    fn unavailable() -> CrmError {
        CrmError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl CrmApi for FakeCrm {
    async fn search_unprocessed(&self, limit: u32) -> Result<Vec<Contact>, CrmError> {
        self.search_limits.lock().unwrap().push(limit);
        if self.fail_search {
            return Err(Self::unavailable());
        }
        Ok(self.contacts.iter().take(limit as usize).cloned().collect())
    }

    async fn update_persona(&self, contact_id: &str, update: &PersonaUpdate) -> Result<(), CrmError> {
        self.updates
            .lock()
            .unwrap()
            .push((contact_id.to_string(), update.clone()));
        if self.fail_updates {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn persona_options(&self) -> Result<Vec<PersonaOption>, CrmError> {
        self.persona_calls.fetch_add(1, Ordering::SeqCst);
        self.personas.clone().ok_or_else(Self::unavailable)
    }
}

/// Fake completion model returning a canned reply (or failing) and recording prompts.
pub struct FakeModel {
    reply: Option<String>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionModel for FakeModel {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        self.reply.clone().ok_or(LlmError::Api {
            status: 401,
            message: "invalid api key".to_string(),
        })
    }
}
