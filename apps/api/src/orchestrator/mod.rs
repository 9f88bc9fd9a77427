//! Orchestrator — one pass over the CRM's unprocessed contacts.
//!
//! Per run: fetch, then for each contact skip (missing fields), skip (already
//! processed), or classify and write back. Contacts are handled strictly one
//! at a time. The only state carried between runs is the CRM's processed flag.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::activity_log::ActivityLog;
use crate::classifier::{Classifier, Fallback};
use crate::crm::{self, CrmApi, PersonaCache, PersonaOption};

pub mod runs;
pub mod scheduler;

pub use runs::{RunRecord, RunRegistry, RunTrigger};

/// Counters reported for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub classified: usize,
    pub updated: usize,
    pub update_failures: usize,
    pub skipped_missing_fields: usize,
    pub skipped_already_processed: usize,
}

#[derive(Clone)]
pub struct Orchestrator {
    crm: Arc<dyn CrmApi>,
    classifier: Classifier,
    personas: PersonaCache,
    log: ActivityLog,
    runs: RunRegistry,
    batch_limit: u32,
}

impl Orchestrator {
    pub fn new(
        crm: Arc<dyn CrmApi>,
        classifier: Classifier,
        personas: PersonaCache,
        log: ActivityLog,
        runs: RunRegistry,
        batch_limit: u32,
    ) -> Self {
        Self {
            crm,
            classifier,
            personas,
            log,
            runs,
            batch_limit,
        }
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Classifies every eligible contact from one CRM fetch.
    ///
    /// Does not take the run slot; use `spawn_run` or `run_exclusive` for that.
    pub async fn process_contacts(&self) -> RunSummary {
        self.log.info("Starting persona assignment...");

        let contacts = crm::fetch_contacts(self.crm.as_ref(), &self.log, self.batch_limit).await;
        let mut summary = RunSummary {
            fetched: contacts.len(),
            ..Default::default()
        };

        if contacts.is_empty() {
            self.log.info("No unprocessed contacts found.");
            return summary;
        }

        // Loaded on first use so a run of skips never touches the property API.
        let mut allowed: Option<Option<Vec<PersonaOption>>> = None;

        for contact in &contacts {
            let Some((job_title, company)) = contact.classification_input() else {
                self.log.info(format!(
                    "Skipping contact {} (missing job title or company)",
                    contact.id
                ));
                summary.skipped_missing_fields += 1;
                continue;
            };

            if contact.is_already_processed() {
                let reason = match (contact.persona.as_deref().map(str::trim), contact.confidence) {
                    (Some(persona), Some(confidence)) if !persona.is_empty() => {
                        format!("already has a persona ({persona}, {confidence}%)")
                    }
                    (Some(persona), None) if !persona.is_empty() => {
                        format!("already has a persona ({persona})")
                    }
                    _ => match contact.last_checked {
                        Some(at) => format!("already processed (last checked {})", at.to_rfc3339()),
                        None => "already processed".to_string(),
                    },
                };
                self.log
                    .info(format!("Contact {} {reason}. Skipping.", contact.id));
                summary.skipped_already_processed += 1;
                continue;
            }

            if allowed.is_none() {
                allowed = Some(
                    self.personas
                        .get_or_fetch(self.crm.as_ref(), &self.log)
                        .await,
                );
            }
            let allowed_personas = allowed.as_ref().and_then(|a| a.as_deref());

            let name = contact.display_name();
            tracing::debug!(
                contact = %contact.id,
                name = name.as_deref().unwrap_or("-"),
                "classifying"
            );
            let classification = self
                .classifier
                .classify(job_title, company, allowed_personas)
                .await;
            summary.classified += 1;

            match &classification.fallback {
                Some(Fallback::Failed(e)) => {
                    self.log
                        .error(format!("Error classifying contact {}: {e}", contact.id));
                }
                Some(Fallback::Unmatched(reply)) if reply.is_empty() => {
                    self.log.warn(format!(
                        "Contact {}: empty reply from model, using Unknown",
                        contact.id
                    ));
                }
                Some(Fallback::Unmatched(reply)) => {
                    self.log.warn(format!(
                        "Contact {}: reply '{reply}' is not a known persona, using Unknown",
                        contact.id
                    ));
                }
                None => {}
            }
            if classification.value.is_none() {
                self.log.warn(format!(
                    "Contact {}: CRM persona list has no '{}' option; persona left unset",
                    contact.id, classification.persona
                ));
            }

            if crm::update_contact(
                self.crm.as_ref(),
                &self.log,
                &contact.id,
                classification.value.as_deref(),
                classification.confidence,
            )
            .await
            {
                summary.updated += 1;
            } else {
                summary.update_failures += 1;
            }
        }

        self.log.info(format!(
            "Done. {} contact(s) fetched, {} updated, {} skipped, {} failed.",
            summary.fetched,
            summary.updated,
            summary.skipped_missing_fields + summary.skipped_already_processed,
            summary.update_failures
        ));
        summary
    }

    /// Starts a run in the background and returns its id immediately.
    /// On conflict returns the id of the run already in progress.
    pub fn spawn_run(&self, trigger: RunTrigger) -> Result<Uuid, Uuid> {
        let active = self.runs.begin(trigger)?;
        let id = active.id();

        let orchestrator = self.clone();
        tokio::spawn(async move {
            let summary = orchestrator.process_contacts().await;
            active.complete(summary);
        });

        Ok(id)
    }

    /// Runs to completion in the caller's task, or returns `None` without
    /// running if another run holds the slot.
    pub async fn run_exclusive(&self, trigger: RunTrigger) -> Option<RunSummary> {
        let active = match self.runs.begin(trigger) {
            Ok(active) => active,
            Err(running) => {
                self.log.warn(format!(
                    "Skipping {} run: run {running} is still in progress",
                    trigger_name(trigger)
                ));
                return None;
            }
        };

        let summary = self.process_contacts().await;
        active.complete(summary.clone());
        Some(summary)
    }
}

fn trigger_name(trigger: RunTrigger) -> &'static str {
    match trigger {
        RunTrigger::Startup => "startup",
        RunTrigger::Schedule => "scheduled",
        RunTrigger::Manual => "manual",
    }
}
