use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::models::TabId;

/// Which enrichment stages to run.
///
/// Content extraction has no flag of its own; it runs whenever a later
/// stage needs page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessType {
    pub screenshot: bool,
    pub ai: bool,
    pub embeddings: bool,
}

impl ProcessType {
    pub const FULL: Self = Self {
        screenshot: true,
        ai: true,
        embeddings: true,
    };
    pub const NONE: Self = Self {
        screenshot: false,
        ai: false,
        embeddings: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }

    pub fn needs_content(&self) -> bool {
        self.ai || self.embeddings
    }

    fn with(mut self, stage: &str) -> Result<Self, UnknownStage> {
        match stage.trim().to_ascii_lowercase().as_str() {
            "full" | "all" => return Ok(Self::FULL),
            "screenshot" | "screenshots" => self.screenshot = true,
            "ai" => self.ai = true,
            "embedding" | "embeddings" => self.embeddings = true,
            _ => return Err(UnknownStage(stage.to_string())),
        }
        Ok(self)
    }
}

impl Default for ProcessType {
    fn default() -> Self {
        Self::FULL
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown process type '{0}', expected full, screenshots, ai or embeddings")]
pub struct UnknownStage(pub String);

impl FromStr for ProcessType {
    type Err = UnknownStage;

    /// `"full"`, a single stage, or a comma separated list of stages.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .try_fold(Self::NONE, |acc, stage| acc.with(stage))
    }
}

impl<'de> Deserialize<'de> for ProcessType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }

        let stages = match Raw::deserialize(deserializer)? {
            Raw::One(stage) => vec![stage],
            Raw::Many(stages) => stages,
        };
        stages
            .iter()
            .try_fold(Self::NONE, |acc, stage| acc.with(stage))
            .map_err(serde::de::Error::custom)
    }
}

/// Which stages produced and stored their fields for one tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    pub screenshots: bool,
    pub ai: bool,
    pub embeddings: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabOutcome {
    pub tab_id: TabId,
    pub status: OutcomeStatus,
    pub updates: StageFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TabOutcome {
    pub fn success(tab_id: TabId, updates: StageFlags) -> Self {
        Self {
            tab_id,
            status: OutcomeStatus::Success,
            updates,
            error: None,
        }
    }

    pub fn failed(tab_id: TabId, error: impl fmt::Display) -> Self {
        Self {
            tab_id,
            status: OutcomeStatus::Failed,
            updates: StageFlags::default(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Aggregated result of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<TabOutcome>,
    /// First few failure messages; counts above are always complete
    pub errors: Vec<String>,
}

impl BatchReport {
    pub fn record(&mut self, outcome: TabOutcome, max_errors: usize) {
        self.processed += 1;
        if outcome.is_success() {
            self.successful += 1;
        } else {
            self.failed += 1;
            if let Some(error) = &outcome.error {
                if self.errors.len() < max_errors {
                    self.errors.push(format!("{}: {}", outcome.tab_id, error));
                }
            }
        }
        self.results.push(outcome);
    }
}

/// Whether to pause between chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pacing {
    /// Background imports: chunks run back to back.
    #[default]
    None,
    /// Bulk regeneration against rate-limited providers.
    RateLimited,
}
