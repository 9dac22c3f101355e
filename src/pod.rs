use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::types::PodName;

/// Pod collection returned by `GET /api/v1/namespaces/{ns}/pods`.
///
/// Only the fields the portal inspects are typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PodList {
    #[serde(default)]
    pub items: Vec<PodSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PodSummary {
    pub metadata: PodMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct PodMetadata {
    pub name: PodName,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl PodList {
    /// Names of pods whose `name` label equals `label`.
    #[must_use]
    pub fn names_labelled(&self, label: &str) -> Vec<PodName> {
        self.items
            .iter()
            .filter(|pod| pod.metadata.labels.get("name").map(String::as_str) == Some(label))
            .map(|pod| pod.metadata.name.clone())
            .collect()
    }
}

/// Observed state of the bot's pods.
#[derive(Debug, Clone, PartialEq)]
pub enum PodStatus {
    /// No pod carries the bot label: the bot is down.
    NoPod,
    /// Exactly one pod, with its detail document.
    Running(JsonValue),
    /// Several pods: one is being terminated during a restart.
    Terminating(Vec<JsonValue>),
}

/// Result of a restart-by-deletion attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodDeletion {
    Deleted(PodName),
    /// Not exactly one pod was observed; nothing was deleted.
    Refused { observed: usize },
}
