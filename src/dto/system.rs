use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub service: Option<String>,
}

impl HealthResponse {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Which backend prerequisites are in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigStatus {
    pub credentials_json: bool,
    pub token_json: bool,
    pub groq_api_key: bool,
    pub vector_index: bool,
    pub email_metadata: bool,
}

impl ConfigStatus {
    /// Names of prerequisites that are still missing.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("credentials_json", self.credentials_json),
            ("token_json", self.token_json),
            ("groq_api_key", self.groq_api_key),
            ("vector_index", self.vector_index),
            ("email_metadata", self.email_metadata),
        ]
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemStatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub config_status: ConfigStatus,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigFlags {
    pub groq_api_key_set: bool,
    pub gmail_credentials_exist: bool,
    pub gmail_token_exist: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigResponse {
    #[serde(default)]
    pub config: ConfigFlags,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groq_api_key: Option<String>,
}
