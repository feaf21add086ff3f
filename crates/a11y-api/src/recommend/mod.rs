//! Recommendation resolution
//!
//! Remediation text for an issue code comes from, in order: the static
//! table, a recommendation already stored for the same code, the
//! generative provider, and finally a generic templated string.
//! Resolution never fails.

pub mod openai;

use crate::db::ScanStore;
use a11y_core::IssueId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use openai::{DisabledProvider, OpenAiProvider};

/// Known rule codes and their remediation text
pub const STATIC_RECOMMENDATIONS: &[(&str, &str)] = &[
    (
        "color-contrast",
        "Ensure text has sufficient color contrast ratio (at least 4.5:1 for normal text, 3:1 for large text). Use tools like WebAIM Contrast Checker to verify.",
    ),
    (
        "image-alt",
        "Add descriptive alt text that conveys the content and function of images. For decorative images, use empty alt attribute: alt=''.",
    ),
    (
        "link-name",
        "Ensure all links have discernible text. Add aria-label or visible text content that describes the link destination.",
    ),
    (
        "button-name",
        "Buttons must have accessible names. Use aria-label or inner text content to describe the button's function.",
    ),
    (
        "document-title",
        "Provide a descriptive title for the web page using the <title> element in the <head> section.",
    ),
    (
        "html-has-lang",
        "Specify a valid language attribute on the HTML element (e.g., <html lang='en'>).",
    ),
    (
        "aria-hidden-focus",
        "Ensure elements with aria-hidden='true' are not focusable. Remove tabindex or set it to -1.",
    ),
    (
        "label",
        "Associate form controls with labels using the for attribute or by nesting the control inside the label.",
    ),
    (
        "input-button-name",
        "Provide a descriptive value attribute for input buttons, or use a <button> element with text content.",
    ),
];

pub const NO_CODE_RECOMMENDATION: &str = "No recommendation available for this issue.";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider credentials are not configured")]
    MissingCredentials,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned an empty response")]
    EmptyResponse,

    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),
}

/// A generative text service answering a single prompt
#[async_trait]
pub trait RecommendationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Where a recommendation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationSource {
    Static,
    Cache,
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub text: String,
    pub source: RecommendationSource,
}

pub fn static_recommendation(code: &str) -> Option<&'static str> {
    STATIC_RECOMMENDATIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, text)| *text)
}

pub fn fallback_recommendation(code: &str) -> String {
    format!(
        "Review and fix the {} accessibility issue. Follow WCAG 2.1 guidelines and test with screen readers.",
        code
    )
}

pub fn build_prompt(code: &str, description: Option<&str>) -> String {
    format!(
        "Accessibility issue detected:\n\
         Rule Code: {}\n\
         Description: {}\n\n\
         Provide a clear, actionable recommendation (1-2 sentences) for how to fix this accessibility issue.\n\
         Focus on practical steps developers can take.",
        code,
        description.unwrap_or("Not provided")
    )
}

#[derive(Clone)]
pub struct RecommendationResolver {
    store: ScanStore,
    provider: Arc<dyn RecommendationProvider>,
    timeout: Duration,
}

impl RecommendationResolver {
    pub fn new(store: ScanStore, provider: Arc<dyn RecommendationProvider>, timeout: Duration) -> Self {
        Self {
            store,
            provider,
            timeout,
        }
    }

    /// Resolve remediation text for `code`, writing it onto `issue` when given
    pub async fn resolve(&self, code: &str, description: Option<&str>, issue: Option<IssueId>) -> String {
        self.resolve_detailed(code, description, issue).await.text
    }

    pub async fn resolve_detailed(
        &self,
        code: &str,
        description: Option<&str>,
        issue: Option<IssueId>,
    ) -> Resolution {
        let resolution = self.lookup(code.trim(), description).await;
        debug!(code, source = ?resolution.source, "Resolved recommendation");

        if let Some(issue_id) = issue {
            if let Err(e) = self.store.set_recommendation(issue_id, &resolution.text).await {
                error!(issue_id, error = %e, "Failed to persist recommendation");
            }
        }
        resolution
    }

    async fn lookup(&self, code: &str, description: Option<&str>) -> Resolution {
        if code.is_empty() {
            return Resolution {
                text: NO_CODE_RECOMMENDATION.to_string(),
                source: RecommendationSource::Fallback,
            };
        }

        if let Some(text) = static_recommendation(code) {
            info!(code, "Using predefined recommendation");
            return Resolution {
                text: text.to_string(),
                source: RecommendationSource::Static,
            };
        }

        let fallback = fallback_recommendation(code);

        match self.store.cached_recommendation(code, &fallback).await {
            Ok(Some(text)) => {
                info!(code, "Using cached recommendation");
                return Resolution {
                    text,
                    source: RecommendationSource::Cache,
                };
            }
            Ok(None) => {}
            Err(e) => warn!(code, error = %e, "Recommendation cache lookup failed"),
        }

        let prompt = build_prompt(code, description);
        let generated = match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(Ok(_)) => Err(ProviderError::EmptyResponse),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout(self.timeout)),
        };

        match generated {
            Ok(text) => Resolution {
                text,
                source: RecommendationSource::Generated,
            },
            Err(e) => {
                warn!(code, provider = self.provider.name(), error = %e, "Recommendation generation failed, using fallback");
                Resolution {
                    text: fallback,
                    source: RecommendationSource::Fallback,
                }
            }
        }
    }
}
