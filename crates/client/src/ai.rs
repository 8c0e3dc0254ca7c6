//! Client for the generative-AI service.
//!
//! The service is an opaque text/image generation boundary. Transient
//! overloads are retried with exponential backoff; everything else surfaces
//! to the caller.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use campusnet_shared::ApiError;
use serde::{Deserialize, Serialize};

use crate::stores::profile::MentorResponder;

const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

/// A generated answer: text plus deduplicated source links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    pub text: String,
    #[serde(default)]
    pub grounding_links: Vec<GroundingLink>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingLink {
    pub title: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Ask the service to ground the answer in web search results.
    grounded: bool,
    /// Ask for an image payload instead of text.
    image: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    links: Vec<GroundingLink>,
    /// Base64 PNG payload when an image was requested.
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn generate_once(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let url = format!("{}/v1/generate", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        serde_json::from_str(&text).map_err(|e| ApiError::Deserialize(e.to_string()))
    }

    /// Retry `op` on transient-overload errors, doubling the delay each time.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut retries = MAX_RETRIES;
        let mut delay = RETRY_BASE_DELAY;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_overloaded() && retries > 0 => {
                    tracing::warn!(
                        "AI service overloaded, retrying in {}ms ({retries} attempts left)",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retries -= 1;
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ApiError> {
        let mut resp = self.with_retry(|| self.generate_once(&request)).await?;
        resp.links = dedupe_links(resp.links);
        Ok(resp)
    }

    /// Rewrite a professional-experience draft into a high-impact description.
    pub async fn improve_experience_text(
        &self,
        role: &str,
        company: &str,
        description: &str,
    ) -> Result<String, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: format!(
                    "Role: {role}\nCompany: {company}\nDraft description: {description}\n\n\
                     Task: rewrite this professional experience to be high-impact. Use action verbs."
                ),
                system: Some(
                    "You are a career coach. Transform descriptions into high-impact \
                     professional highlights."
                        .to_string(),
                ),
                grounded: false,
                image: false,
            })
            .await?;
        Ok(resp.text.unwrap_or_else(|| description.to_string()))
    }

    /// The acceptance message a mentor sends back for a request.
    pub async fn generate_mentor_response(
        &self,
        mentor_name: &str,
        mentor_role: &str,
        interests: &[String],
    ) -> Result<String, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: format!(
                    "Mentor: {mentor_name}, Role: {mentor_role}\nStudent interests: {}\n\n\
                     Task: write a welcoming response as this mentor, accepting the request.",
                    interests.join(", ")
                ),
                system: Some(
                    "You are a professional mentor in a student career network. Your tone is \
                     encouraging and concrete."
                        .to_string(),
                ),
                grounded: false,
                image: false,
            })
            .await?;
        Ok(resp
            .text
            .unwrap_or_else(|| "I'm excited to support your journey.".to_string()))
    }

    /// Risk analysis for a startup concept.
    pub async fn venture_analysis(&self, concept: &str) -> Result<String, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: format!("Analyze the following startup idea: {concept}"),
                system: Some(
                    "You are a venture analyst. Cover market, money, manpower, mentoring, \
                     method, and product."
                        .to_string(),
                ),
                grounded: false,
                image: false,
            })
            .await?;
        Ok(resp.text.unwrap_or_else(|| "Analysis unavailable.".to_string()))
    }

    /// A logo-style visual for a venture concept, as a data URI.
    pub async fn venture_visual(&self, concept: &str) -> Result<Option<String>, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: format!(
                    "A professional, minimal, high-tech logo for a venture based on this \
                     concept: {concept}. Solid background, sharp edges."
                ),
                system: None,
                grounded: false,
                image: true,
            })
            .await?;
        Ok(resp.image.map(|b64| format!("data:image/png;base64,{b64}")))
    }

    /// A grounded answer to a learning question.
    pub async fn learning_response(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<AiResponse, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: prompt.to_string(),
                system: Some(format!(
                    "You are a study assistant. Context: {}.",
                    context.unwrap_or("General")
                )),
                grounded: true,
                image: false,
            })
            .await?;
        Ok(AiResponse {
            text: resp.text.unwrap_or_else(|| "No details found.".to_string()),
            grounding_links: resp.links,
        })
    }

    /// Grounded search for current courses and certifications on a topic.
    pub async fn search_courses(&self, topic: &str) -> Result<AiResponse, ApiError> {
        let resp = self
            .generate(GenerateRequest {
                prompt: format!(
                    "Find high-quality upcoming professional courses and certifications for: \
                     {topic}. Prefer established providers and university programs."
                ),
                system: None,
                grounded: true,
                image: false,
            })
            .await?;
        Ok(AiResponse {
            text: resp.text.unwrap_or_default(),
            grounding_links: resp.links,
        })
    }

    /// Grounded search for nearby tech/startup events.
    pub async fn nearby_events(
        &self,
        query: &str,
        coords: Option<(f64, f64)>,
    ) -> Result<AiResponse, ApiError> {
        let location = match coords {
            Some((lat, lng)) => format!(" near coordinates {lat}, {lng}"),
            None => " in nearby hubs".to_string(),
        };
        let resp = self
            .generate(GenerateRequest {
                prompt: format!(
                    "Find upcoming tech, AI, startup, and hackathon events{location}. \
                     Focus on: {query}. For each event list the title, date, venue, and \
                     official URL. Do not invent events."
                ),
                system: None,
                grounded: true,
                image: false,
            })
            .await?;
        Ok(AiResponse {
            text: resp
                .text
                .unwrap_or_else(|| "No active events found.".to_string()),
            grounding_links: resp.links,
        })
    }
}

#[async_trait]
impl MentorResponder for AiClient {
    async fn mentor_response(
        &self,
        mentor_name: &str,
        mentor_role: &str,
        interests: &[String],
    ) -> Result<String, ApiError> {
        self.generate_mentor_response(mentor_name, mentor_role, interests)
            .await
    }
}

/// Keep the first link per URI, preserving order.
fn dedupe_links(links: Vec<GroundingLink>) -> Vec<GroundingLink> {
    let mut seen = std::collections::HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.uri.clone()))
        .collect()
}
