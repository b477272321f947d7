//! Endpoint probe.
//!
//! Asks the configured OpenAI-compatible server for its `/models` list at
//! startup, so a wrong base URL or a rejected key shows up before the
//! first chat turn instead of as a silent fallback reply.

use std::time::Duration;

use serde::Deserialize;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A single entry of the `/models` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
}

/// Raw shape of the `/models` JSON response.
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// Fetch the model list from `{base_url}/models`.
///
/// Returns `Err(reason)` when the server is unreachable, rejects the key,
/// or answers with something other than a model list.
pub fn fetch_models(base_url: &str, api_key: Option<&str>) -> Result<Vec<ModelInfo>, String> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));
    let client = reqwest::blocking::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let mut request = client.get(&url);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request
        .send()
        .map_err(|e| format!("Endpoint unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Endpoint returned HTTP {}", response.status()));
    }

    let models: ModelsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse model list: {}", e))?;

    Ok(models.data)
}

/// Whether `model` appears in `models`.
pub fn lists_model(models: &[ModelInfo], model: &str) -> bool {
    models.iter().any(|m| m.id == model)
}
