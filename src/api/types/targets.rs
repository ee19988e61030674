//! Provider target parsing for query strings and request bodies

use serde::Deserialize;

use super::error::ApiError;
use crate::domain::ProviderSource;

/// Targets as sent by clients: `"supabase,flowise"` or `["supabase", "flowise"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TargetList {
    List(Vec<String>),
    Csv(String),
}

impl TargetList {
    pub fn parse(&self) -> Result<Vec<ProviderSource>, ApiError> {
        match self {
            Self::List(names) => names.iter().map(|n| parse_target(n)).collect(),
            Self::Csv(csv) => parse_csv(csv),
        }
    }
}

/// Parse a single provider name
pub fn parse_target(name: &str) -> Result<ProviderSource, ApiError> {
    name.parse().map_err(ApiError::from)
}

/// Parse a comma-separated provider list; an empty string is an empty set
pub fn parse_csv(csv: &str) -> Result<Vec<ProviderSource>, ApiError> {
    csv.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(parse_target)
        .collect()
}

/// `None` when the client sent nothing, so the configured defaults apply
pub fn parse_optional(
    targets: Option<&TargetList>,
) -> Result<Option<Vec<ProviderSource>>, ApiError> {
    targets.map(TargetList::parse).transpose()
}
