//! HubSpot CRM v3 transport.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::crm::models::{
    Contact, PersonaOption, PersonaUpdate, PropertyDefinition, SearchRequest, SearchResponse,
    PROP_PERSONA,
};
use crate::crm::{CrmApi, CrmError};

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct HubSpotErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HubSpotClient {
    pub fn new(base_url: String, api_key: String) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turns a non-2xx response into `CrmError::Api`, preferring HubSpot's `message` field.
async fn check_status(response: Response) -> Result<Response, CrmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<HubSpotErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(CrmError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl CrmApi for HubSpotClient {
    async fn search_unprocessed(&self, limit: u32) -> Result<Vec<Contact>, CrmError> {
        let response = self
            .client
            .post(self.url("/crm/v3/objects/contacts/search"))
            .bearer_auth(&self.api_key)
            .json(&SearchRequest::unprocessed(limit))
            .send()
            .await?;
        let body: SearchResponse = check_status(response).await?.json().await?;

        debug!("HubSpot search returned {} contact(s)", body.results.len());
        Ok(body.results.into_iter().map(Contact::from).collect())
    }

    async fn update_persona(&self, contact_id: &str, update: &PersonaUpdate) -> Result<(), CrmError> {
        let response = self
            .client
            .patch(self.url(&format!("/crm/v3/objects/contacts/{contact_id}")))
            .bearer_auth(&self.api_key)
            .json(&update.to_properties())
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn persona_options(&self) -> Result<Vec<PersonaOption>, CrmError> {
        let response = self
            .client
            .get(self.url(&format!("/crm/v3/properties/contacts/{PROP_PERSONA}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let definition: PropertyDefinition = check_status(response).await?.json().await?;
        Ok(definition.visible_options())
    }
}
