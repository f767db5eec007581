//! Reqwest-backed knowledge-base interaction lookup.
//!
//! The adapter owns transport details only: request serialisation, timeout and status
//! mapping, and turning retrieved passages into [`InteractionRecord`]s.

use std::time::Duration;

use async_trait::async_trait;
use medivault_core::{Citation, CoreError, CoreResult, InteractionLookup, InteractionRecord};
use medivault_shared::Masked;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{extract_action, extract_summary, infer_severity, truncate_chars};

const PASSAGE_MAX_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct KnowledgeBaseSettings {
    /// Base URL of the retrieval service. `None` disables lookups.
    pub endpoint: Option<Url>,
    pub knowledge_base_id: String,
    pub api_key: Option<Masked<String>>,
    pub timeout: Duration,
    pub max_results: u32,
}

pub struct KnowledgeBaseLookup {
    client: Client,
    settings: KnowledgeBaseSettings,
}

impl KnowledgeBaseLookup {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(settings: KnowledgeBaseSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    pub fn is_configured(&self) -> bool {
        self.settings.endpoint.is_some() && !self.settings.knowledge_base_id.trim().is_empty()
    }

    fn retrieve_url(&self, endpoint: &Url) -> CoreResult<Url> {
        let raw = format!(
            "{}/knowledgebases/{}/retrieve",
            endpoint.as_str().trim_end_matches('/'),
            self.settings.knowledge_base_id.trim()
        );
        Url::parse(&raw).map_err(|e| CoreError::LookupFailed(format!("invalid retrieve URL: {e}")))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveRequest {
    retrieval_query: RetrievalQuery,
    retrieval_configuration: RetrievalConfiguration,
}

#[derive(Debug, Serialize)]
struct RetrievalQuery {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalConfiguration {
    vector_search_configuration: VectorSearchConfiguration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VectorSearchConfiguration {
    number_of_results: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrieveResponse {
    #[serde(default)]
    retrieval_results: Vec<RetrievalResult>,
}

#[derive(Debug, Deserialize)]
struct RetrievalResult {
    #[serde(default)]
    content: Option<RetrievalContent>,
    #[serde(default)]
    location: Option<RetrievalLocation>,
    #[serde(default)]
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RetrievalContent {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalLocation {
    #[serde(default)]
    s3_location: Option<LocationUri>,
    #[serde(default)]
    web_location: Option<LocationUri>,
}

#[derive(Debug, Deserialize)]
struct LocationUri {
    #[serde(default)]
    uri: String,
}

impl RetrievalLocation {
    fn uri(&self) -> Option<&str> {
        self.s3_location
            .as_ref()
            .or(self.web_location.as_ref())
            .map(|l| l.uri.as_str())
    }
}

fn build_query(subject: &str, references: &[String]) -> String {
    format!("drug interaction {} {}", subject, references.join(" "))
}

fn record_from_passage(result: &RetrievalResult, counterpart: Option<&String>) -> InteractionRecord {
    let text = result
        .content
        .as_ref()
        .map(|c| c.text.as_str())
        .unwrap_or_default();
    let snippet = truncate_chars(text, PASSAGE_MAX_CHARS);
    let source_uri = result
        .location
        .as_ref()
        .and_then(RetrievalLocation::uri)
        .unwrap_or_default()
        .to_string();
    let title = if source_uri.is_empty() {
        "Unknown".to_string()
    } else {
        source_uri.clone()
    };

    InteractionRecord {
        counterpart: counterpart.cloned(),
        severity: infer_severity(&snippet),
        summary: extract_summary(&snippet),
        description: snippet.clone(),
        action: extract_action(&snippet),
        citations: vec![Citation {
            title,
            snippet,
            source_uri,
            relevance_score: result.score.unwrap_or(0.0),
        }],
    }
}

fn records_from_response(
    response: RetrieveResponse,
    references: &[String],
) -> Vec<InteractionRecord> {
    if response.retrieval_results.is_empty() {
        let mut record = InteractionRecord::unknown(
            "No evidence found in Knowledge Base",
            "No supporting documents retrieved",
        );
        record.action = "Consult healthcare provider for verification".to_string();
        return vec![record];
    }

    // A single reference lets every passage be attributed to it.
    let counterpart = match references {
        [only] => Some(only),
        _ => None,
    };
    response
        .retrieval_results
        .iter()
        .map(|r| record_from_passage(r, counterpart))
        .collect()
}

#[async_trait]
impl InteractionLookup for KnowledgeBaseLookup {
    async fn check(
        &self,
        subject: &str,
        references: &[String],
    ) -> CoreResult<Vec<InteractionRecord>> {
        let endpoint = match &self.settings.endpoint {
            Some(endpoint) if self.is_configured() => endpoint,
            _ => {
                return Ok(vec![InteractionRecord::unknown(
                    "Knowledge Base not configured",
                    "Cannot verify - KB not available",
                )])
            }
        };

        let url = self.retrieve_url(endpoint)?;
        let body = RetrieveRequest {
            retrieval_query: RetrievalQuery {
                text: build_query(subject, references),
            },
            retrieval_configuration: RetrievalConfiguration {
                vector_search_configuration: VectorSearchConfiguration {
                    number_of_results: self.settings.max_results.max(1),
                },
            },
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::LookupFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::LookupFailed(format!(
                "knowledge base returned {}",
                status
            )));
        }

        let decoded: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| CoreError::LookupFailed(format!("invalid knowledge base payload: {e}")))?;
        debug!(
            "Knowledge base returned {} passages for {}",
            decoded.retrieval_results.len(),
            subject
        );

        Ok(records_from_response(decoded, references))
    }
}
