//! Short-lived credential cookie.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{Error, Result};
use crate::util::{system_clock, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

/// Attributes written alongside a cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub max_age: TimeDelta,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl CookieOptions {
    /// Options for a credential cookie: `HttpOnly; Secure; SameSite=Strict`.
    pub fn credential(max_age: TimeDelta) -> Self {
        Self {
            max_age,
            path: "/".to_string(),
            http_only: true,
            secure: true,
            same_site: SameSite::Strict,
        }
    }
}

pub trait CookieJar: Send + Sync {
    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()>;
    /// Current value, or `None` when missing or past its max-age.
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn remove(&self, name: &str) -> Result<()>;
}

struct StoredCookie {
    value: String,
    options: CookieOptions,
    expires_at: DateTime<Utc>,
}

/// In-process cookie jar honoring max-age.
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<String, StoredCookie>>,
    clock: Clock,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            cookies: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Attributes the cookie was last written with, if it is still live.
    pub fn options(&self, name: &str) -> Result<Option<CookieOptions>> {
        let now = (self.clock)();
        Ok(self
            .lock()?
            .get(name)
            .filter(|cookie| cookie.expires_at > now)
            .map(|cookie| cookie.options.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredCookie>>> {
        self.cookies
            .lock()
            .map_err(|error| Error::persistence("cookie jar lock poisoned", error))
    }
}

impl Default for MemoryCookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar for MemoryCookieJar {
    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let expires_at = (self.clock)() + options.max_age;
        self.lock()?.insert(
            name.to_string(),
            StoredCookie {
                value: value.to_string(),
                options: options.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        let now = (self.clock)();
        let mut cookies = self.lock()?;
        match cookies.get(name) {
            Some(cookie) if cookie.expires_at > now => Ok(Some(cookie.value.clone())),
            Some(_) => {
                cookies.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}
