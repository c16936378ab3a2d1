use anyhow::anyhow;
use cookie::SameSite;
use tracing::warn;

use crate::config::{env_bool, env_string, Lookup};

/// Longest session lifetime accepted from the environment: 365 days.
pub const MAX_SESSION_TTL_MINUTES: i64 = 365 * 24 * 60;

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub session_secret: String,
    pub session_ttl_minutes: i64,
    pub session_cookie_name: String,
    pub flash_cookie_name: String,
    pub secure_cookies: bool,
    pub same_site: SameSite,
}

impl SecurityConfig {
    pub fn from_lookup(lookup: &Lookup<'_>) -> anyhow::Result<Self> {
        let session_secret = env_string(lookup, "SESSION_SECRET")
            .ok_or_else(|| anyhow!("SESSION_SECRET missing; set a long random value"))?;
        if session_secret.len() < 32 {
            warn!("SESSION_SECRET is shorter than 32 bytes");
        }

        let session_ttl_minutes = match env_string(lookup, "SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|m| (1..=MAX_SESSION_TTL_MINUTES).contains(m))
                .ok_or_else(|| {
                    anyhow!("SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}")
                })?,
            None => 24 * 60,
        };

        let session_cookie_name = env_string(lookup, "SESSION_COOKIE_NAME")
            .unwrap_or_else(|| "plugwise_session".into());

        let mut secure_cookies = env_bool(lookup, "COOKIE_SECURE").unwrap_or(true);
        let same_site = env_same_site(lookup).unwrap_or(SameSite::Lax);

        if same_site == SameSite::None && !secure_cookies {
            warn!("SameSite=None requires secure cookies; forcing COOKIE_SECURE=true");
            secure_cookies = true;
        }

        Ok(SecurityConfig {
            session_secret,
            session_ttl_minutes,
            session_cookie_name,
            flash_cookie_name: "plugwise_flash".into(),
            secure_cookies,
            same_site,
        })
    }
}

fn env_same_site(lookup: &Lookup<'_>) -> Option<SameSite> {
    env_string(lookup, "COOKIE_SAMESITE").and_then(|v| match v.to_ascii_lowercase().as_str() {
        "none" => Some(SameSite::None),
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        other => {
            warn!("ignoring unknown COOKIE_SAMESITE value `{other}`");
            None
        }
    })
}
