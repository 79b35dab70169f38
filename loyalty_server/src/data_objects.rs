use lps_common::Points;
use serde::{Deserialize, Serialize};

/// Login/password pair used by both registration and login.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    /// Registration-time sanity checks. Anything stricter (password policies etc.) belongs in a gateway in
    /// front of this service.
    pub fn is_well_formed(&self) -> bool {
        !self.login.trim().is_empty() && !self.password.is_empty()
    }
}

/// Body of a points-withdrawal request.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalRequest {
    pub order: String,
    pub sum: Points,
}

/// Body of a successful register/login response. The token also travels in the `Authorization` header.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}
