//! Deployment environments and the endpoints each one targets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Which authorization deployment a session belongs to.
///
/// Persisted as `ci`, `stage` or `prod`; `staging` and `production` are
/// accepted when parsing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Environment {
    #[serde(rename = "ci")]
    #[strum(to_string = "ci")]
    Ci,
    #[serde(rename = "stage", alias = "staging")]
    #[strum(to_string = "stage", serialize = "staging")]
    Staging,
    #[default]
    #[serde(rename = "prod", alias = "production")]
    #[strum(to_string = "prod", serialize = "production")]
    Production,
}

/// Provider endpoints and the public CLI client id for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth_url: String,
    pub client_id: String,
    pub ads_api_url: String,
}

impl Environment {
    pub const ALL: [Environment; 3] = [Self::Ci, Self::Staging, Self::Production];

    pub fn endpoints(self) -> Endpoints {
        let (auth_url, client_id, ads_api_url) = match self {
            // CI shares the production ads API.
            Self::Ci => (
                "https://auth.optima.chat",
                "google-ads-cli-dev",
                "https://ads-api.optima.onl",
            ),
            Self::Staging => (
                "https://auth.stage.optima.onl",
                "google-ads-cli-stage",
                "https://ads-api.stage.optima.onl",
            ),
            Self::Production => (
                "https://auth.optima.onl",
                "google-ads-cli-prod",
                "https://ads-api.optima.onl",
            ),
        };
        Endpoints {
            auth_url: auth_url.to_string(),
            client_id: client_id.to_string(),
            ads_api_url: ads_api_url.to_string(),
        }
    }
}
