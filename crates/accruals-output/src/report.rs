//! JSON run report.
//!
//! Collects the configuration, input paths, per-stage row counts and the
//! output summary of one pipeline run.

use crate::summary::SignalSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Row counts of one pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageReport {
    /// Stage name.
    pub name: String,

    /// Stage statistics as JSON.
    pub stats: serde_json::Value,
}

/// A report of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Version of the producing tool.
    pub version: String,

    /// Input and output locations by role.
    pub paths: BTreeMap<String, String>,

    /// Effective configuration.
    pub config: serde_json::Value,

    /// Stages in execution order.
    pub stages: Vec<StageReport>,

    /// Summary of the output panel.
    pub summary: Option<SignalSummary>,
}

impl RunReport {
    /// Statistics of the named stage.
    pub fn stage(&self, name: &str) -> Option<&serde_json::Value> {
        self.stages.iter().find(|s| s.name == name).map(|s| &s.stats)
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "wrote run report");
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    version: Option<String>,
    paths: BTreeMap<String, String>,
    config: Option<serde_json::Value>,
    stages: Vec<StageReport>,
    summary: Option<SignalSummary>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tool version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Record a path under `role`.
    pub fn path(mut self, role: impl Into<String>, path: &Path) -> Self {
        self.paths.insert(role.into(), path.display().to_string());
        self
    }

    /// Set the effective configuration.
    pub fn config<C: Serialize>(mut self, config: &C) -> Result<Self, ReportError> {
        self.config = Some(serde_json::to_value(config)?);
        Ok(self)
    }

    /// Append the statistics of a stage.
    pub fn stage<S: Serialize>(
        mut self,
        name: impl Into<String>,
        stats: &S,
    ) -> Result<Self, ReportError> {
        self.stages.push(StageReport {
            name: name.into(),
            stats: serde_json::to_value(stats)?,
        });
        Ok(self)
    }

    /// Set the output summary.
    pub fn summary(mut self, summary: SignalSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    /// Build the report.
    pub fn build(self) -> RunReport {
        RunReport {
            timestamp: Utc::now(),
            version: self.version.unwrap_or_default(),
            paths: self.paths,
            config: self.config.unwrap_or(serde_json::Value::Null),
            stages: self.stages,
            summary: self.summary,
        }
    }
}
