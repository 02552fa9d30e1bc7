//! pagebound.yaml settings
//!
//! Every field is optional in the file; missing ones take the defaults below.

use crate::fetch::DEFAULT_USER_AGENT;
use crate::locator::{Strategy, DEFAULT_CEILING};
use crate::marker::{HeaderMarker, InvalidSelector, DEFAULT_SELECTOR, DEFAULT_TEXT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SETTINGS_FILE: &str = "pagebound.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Search strategy
    #[serde(default)]
    pub algorithm: Strategy,

    /// Highest page ever requested
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,

    /// What identifies a page that still lists offers
    #[serde(default)]
    pub marker: MarkerSettings,

    /// User agent sent by the HTTP backend
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSettings {
    /// CSS selector of candidate elements
    #[serde(default = "default_selector")]
    pub selector: String,

    /// Text the element must contain
    #[serde(default = "default_text")]
    pub text: String,
}

fn default_ceiling() -> u32 {
    DEFAULT_CEILING
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_selector() -> String {
    DEFAULT_SELECTOR.to_string()
}

fn default_text() -> String {
    DEFAULT_TEXT.to_string()
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            selector: default_selector(),
            text: default_text(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            algorithm: Strategy::default(),
            ceiling: default_ceiling(),
            marker: MarkerSettings::default(),
            user_agent: default_user_agent(),
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file deserializes to null
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse settings")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn header_marker(&self) -> Result<HeaderMarker, InvalidSelector> {
        HeaderMarker::new(&self.marker.selector, &self.marker.text)
    }
}
