use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::user::{User, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, expiration_hours: i64) -> Self {
        let issued = Utc::now();
        Self {
            sub: user.id.clone(),
            role: user.role,
            iat: issued.timestamp(),
            exp: (issued + Duration::hours(expiration_hours)).timestamp(),
        }
    }
}
