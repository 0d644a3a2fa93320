//! Gemini-backed assistant using the genai crate.

use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatRequest};

use crate::domain::enrichment::traits::{Assistant, Summary};
use crate::domain::ProviderError;

pub const GEMINI_CHAT_MODEL: &str = "gemini-2.0-flash";

/// Page text sent to the model, in characters.
const PROMPT_CONTENT_CHARS: usize = 8_000;
const MAX_TAGS: usize = 5;

pub const CATEGORIES: &[&str] = &[
    "Development",
    "Design",
    "Finance",
    "News",
    "Research",
    "Shopping",
    "Entertainment",
    "Productivity",
    "Education",
    "Social",
    "Travel",
    "Health",
];
const FALLBACK_CATEGORY: &str = "Other";

/// Summarizes and categorizes pages with a Gemini chat model.
///
/// The genai client reads `GEMINI_API_KEY` from the environment.
#[derive(Clone)]
pub struct GeminiAssistant {
    client: genai::Client,
    model: String,
}

impl GeminiAssistant {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            client: genai::Client::default(),
            model: model.into(),
        }
    }

    /// Returns `None` if `GEMINI_API_KEY` is not set.
    pub fn try_from_env(model: &str) -> Option<Self> {
        std::env::var("GEMINI_API_KEY").ok()?;
        Some(Self::with_model(model))
    }

    async fn ask(&self, system: &str, user: String) -> Result<String, ProviderError> {
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(user)]);

        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| ProviderError::from_message(e.to_string()))?;

        response
            .first_text()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::InvalidResponse("empty model response".into()))
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    async fn summarize(&self, url: &str, content: &str) -> Result<Summary, ProviderError> {
        let system = "You summarize web pages for a bookmarking app. Reply with JSON only: \
                      {\"summary\": \"<two sentences>\", \"tags\": [\"<up to five lowercase tags>\"]}";
        let answer = self.ask(system, page_prompt(url, content)).await?;
        Ok(parse_summary(&answer))
    }

    async fn categorize(&self, url: &str, content: &str) -> Result<String, ProviderError> {
        let system = format!(
            "Classify the web page into exactly one of these categories: {}. \
             Reply with the category name only.",
            CATEGORIES.join(", ")
        );
        let answer = self.ask(&system, page_prompt(url, content)).await?;
        Ok(match_category(&answer))
    }
}

fn page_prompt(url: &str, content: &str) -> String {
    let content = page_fetch::truncate_chars(content.trim(), PROMPT_CONTENT_CHARS);
    if content.is_empty() {
        format!("URL: {url}\n\n(no page text available)")
    } else {
        format!("URL: {url}\n\n{content}")
    }
}

/// Models often wrap JSON in a markdown fence; anything unparseable is taken
/// as a plain summary.
fn parse_summary(answer: &str) -> Summary {
    let json = answer
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match serde_json::from_str::<Summary>(json) {
        Ok(mut summary) => {
            summary.summary = summary.summary.trim().to_string();
            summary.tags = summary
                .tags
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .take(MAX_TAGS)
                .collect();
            summary
        }
        Err(_) => Summary {
            summary: answer.trim().to_string(),
            tags: vec![],
        },
    }
}

fn match_category(answer: &str) -> String {
    let answer = answer.trim().trim_matches(|c: char| !c.is_alphanumeric());
    CATEGORIES
        .iter()
        .find(|category| category.eq_ignore_ascii_case(answer))
        .unwrap_or(&FALLBACK_CATEGORY)
        .to_string()
}
