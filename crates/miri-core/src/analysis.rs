use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;

/// Report payload returned by the analysis backend.
///
/// Every section is optional on the wire so a partially filled report still
/// renders; missing or `null` sections deserialize to their empty value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisResult {
    pub business_model: serde_json::Value,
    pub verdict: Option<Verdict>,
    pub risk_evaluation: Option<RiskEvaluation>,
    #[serde(deserialize_with = "null_as_default")]
    pub evidence: Vec<DocumentReview>,
    #[serde(deserialize_with = "null_as_default")]
    pub roadmap: Vec<RoadmapStep>,
    #[serde(deserialize_with = "null_as_default")]
    pub what_ifs: Vec<WhatIfTrigger>,
    #[serde(deserialize_with = "null_as_default")]
    pub cross_domains: Vec<CrossDomainMapping>,
    #[serde(deserialize_with = "null_as_default")]
    pub references: Vec<ReferenceItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Verdict {
    #[serde(deserialize_with = "null_as_default")]
    pub verdict: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    pub citation: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub key_issues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskEvaluation {
    #[serde(deserialize_with = "null_as_default")]
    pub score: String,
    #[serde(deserialize_with = "null_as_default")]
    pub rationale: String,
    #[serde(deserialize_with = "null_as_default")]
    pub key_hurdles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentReview {
    #[serde(deserialize_with = "null_as_default")]
    pub law_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub key_clause: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub summary: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionItem {
    #[serde(deserialize_with = "null_as_default")]
    pub step_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub required_documents: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub submission_agency: String,
    #[serde(deserialize_with = "null_as_default")]
    pub context: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoadmapStep {
    #[serde(deserialize_with = "null_as_default")]
    pub phase: u32,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub estimated_time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub action_items: Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatIfTrigger {
    #[serde(deserialize_with = "null_as_default")]
    pub variable_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossDomainMapping {
    #[serde(deserialize_with = "null_as_default")]
    pub source_domain: String,
    #[serde(deserialize_with = "null_as_default")]
    pub target_domain: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agency_mapping: String,
    #[serde(deserialize_with = "null_as_default")]
    pub law_mapping: String,
    #[serde(deserialize_with = "null_as_default")]
    pub key_differences: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceItem {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

/// Backends send `null` for absent sections as often as they omit the key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl AnalysisResult {
    pub fn reference(&self, one_based_index: usize) -> Option<&ReferenceItem> {
        one_based_index
            .checked_sub(1)
            .and_then(|idx| self.references.get(idx))
    }

    pub fn verdict_code(&self) -> Option<&str> {
        self.verdict.as_ref().map(|verdict| verdict.verdict.as_str())
    }
}
