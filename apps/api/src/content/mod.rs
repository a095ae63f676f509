//! Content store: the CV data behind every page section and the chat briefing.
//!
//! Loaded once at startup (bundled JSON or `CONTENT_PATH`) and read-only afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub mod briefing;
pub mod handlers;

/// Content bundled into the binary; used when `CONTENT_PATH` is not set.
const BUNDLED_CONTENT: &str = include_str!("../../content/portfolio.json");

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Failed to read content file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Content field '{0}' must not be empty")]
    MissingField(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub email: String,
    pub linkedin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperienceEntry {
    pub company: String,
    pub role: String,
    /// Free-text range, e.g. "April 2023 - February 2024".
    pub period: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    #[serde(default)]
    pub period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
    pub result: String,
    #[serde(default)]
    pub skills: Vec<String>,
}

/// The whole CV. Collections keep source order; display order = source order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Portfolio {
    pub name: String,
    pub profile_image: String,
    pub title: String,
    pub location: String,
    pub contact: Contact,
    pub summary: String,
    /// Opening assistant message shown when a chat session mounts.
    pub greeting: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

impl Portfolio {
    pub fn from_json(raw: &str) -> Result<Self, ContentError> {
        let portfolio: Portfolio = serde_json::from_str(raw)?;
        portfolio.validate()?;
        Ok(portfolio)
    }

    pub fn from_path(path: &Path) -> Result<Self, ContentError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn bundled() -> Result<Self, ContentError> {
        Self::from_json(BUNDLED_CONTENT)
    }

    /// First word of the name, used for short labels ("Tanvir in AI").
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }

    /// Initials shown as the header logo.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }

    fn validate(&self) -> Result<(), ContentError> {
        if self.name.trim().is_empty() {
            return Err(ContentError::MissingField("name"));
        }
        if self.greeting.trim().is_empty() {
            return Err(ContentError::MissingField("greeting"));
        }
        Ok(())
    }
}

/// Immutable store handed to the router: the portfolio plus its derived briefing.
#[derive(Debug)]
pub struct ContentStore {
    portfolio: Portfolio,
    briefing: String,
}

impl ContentStore {
    pub fn new(portfolio: Portfolio) -> Self {
        let briefing = briefing::build_system_instruction(&portfolio);
        Self {
            portfolio,
            briefing,
        }
    }

    /// Loads from `path` when given, otherwise from the bundled JSON.
    pub fn load(path: Option<&Path>) -> Result<Self, ContentError> {
        let portfolio = match path {
            Some(path) => {
                info!("Loading portfolio content from {}", path.display());
                Portfolio::from_path(path)?
            }
            None => Portfolio::bundled()?,
        };
        info!(
            "Content loaded: {} experience, {} education, {} project entries",
            portfolio.experience.len(),
            portfolio.education.len(),
            portfolio.projects.len()
        );
        Ok(Self::new(portfolio))
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// System instruction for the assistant, built once from the portfolio.
    pub fn briefing(&self) -> &str {
        &self.briefing
    }

    pub fn greeting(&self) -> &str {
        &self.portfolio.greeting
    }
}
