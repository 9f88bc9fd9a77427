use std::sync::Arc;

use tokio::sync::RwLock;

use crate::activity_log::ActivityLog;
use crate::crm::{CrmApi, PersonaOption};

/// Process-lifetime cache of the CRM persona enumeration.
///
/// Only a successful, non-empty fetch is cached; failures are retried on the
/// next lookup. There is no invalidation short of a restart.
#[derive(Clone, Default)]
pub struct PersonaCache {
    inner: Arc<RwLock<Option<Vec<PersonaOption>>>>,
}

impl PersonaCache {
    pub async fn get_or_fetch(
        &self,
        crm: &dyn CrmApi,
        log: &ActivityLog,
    ) -> Option<Vec<PersonaOption>> {
        if let Some(cached) = self.inner.read().await.as_ref() {
            return Some(cached.clone());
        }

        match crm.persona_options().await {
            Ok(personas) if !personas.is_empty() => {
                log.info(format!("Loaded {} persona(s) from CRM", personas.len()));
                *self.inner.write().await = Some(personas.clone());
                Some(personas)
            }
            Ok(_) => {
                log.warn("CRM persona property has no options; using defaults");
                None
            }
            Err(e) => {
                log.error(format!("Error fetching personas: {e}"));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::test_support::FakeCrm;

    #[tokio::test]
    async fn test_fetches_once_then_serves_cache() {
        let crm = FakeCrm::default().with_personas(&["Architect Alex", "Unknown"]);
        let cache = PersonaCache::default();
        let log = ActivityLog::new(10);

        let first = cache.get_or_fetch(&crm, &log).await;
        let second = cache.get_or_fetch(&crm, &log).await;

        assert_eq!(
            first,
            Some(vec![
                PersonaOption::plain("Architect Alex"),
                PersonaOption::plain("Unknown")
            ])
        );
        assert_eq!(first, second);
        assert_eq!(crm.persona_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let crm = FakeCrm::default();
        let cache = PersonaCache::default();
        let log = ActivityLog::new(10);

        assert_eq!(cache.get_or_fetch(&crm, &log).await, None);
        assert_eq!(cache.get_or_fetch(&crm, &log).await, None);

        assert_eq!(crm.persona_calls.load(Ordering::SeqCst), 2);
        assert!(log.tail(None)[0].message.contains("Error fetching personas"));
    }

    #[tokio::test]
    async fn test_empty_enumeration_is_not_cached() {
        let crm = FakeCrm::default().with_personas(&[]);
        let cache = PersonaCache::default();
        let log = ActivityLog::new(10);

        assert_eq!(cache.get_or_fetch(&crm, &log).await, None);
        assert!(log.tail(None)[0].message.contains("no options"));
    }
}
