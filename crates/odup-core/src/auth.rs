//! Access tokens for the storage API.
//!
//! Acquiring a token (OAuth exchange, sign-in) happens elsewhere; a
//! [`TokenSource`] just hands one over. [`CachedTokenProvider`] keeps the
//! current token and makes sure concurrent callers share a single fetch,
//! failed fetches included.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{Result, UploadError};

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Environment variable holding a pre-acquired access token.
pub const TOKEN_ENV: &str = "ODUP_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    /// None = never expires (as far as we know).
    pub expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => now + REFRESH_MARGIN < at,
            None => true,
        }
    }
}

/// Produces a new access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch(&self) -> Result<AccessToken>;
}

/// Hands out bearer tokens; safe to call from many tasks at once.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    /// Forget any cached token; the next call fetches a new one.
    fn invalidate(&self) {}
}

/// Token known up front (environment, CLI).
#[derive(Debug, Clone)]
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Token from `ODUP_ACCESS_TOKEN`, if set and non-empty.
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Self)
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        Ok(AccessToken {
            token: self.0.clone(),
            expires_at: None,
        })
    }
}

/// Re-reads a token file on each fetch, so an external helper can rotate it.
#[derive(Debug, Clone)]
pub struct FileTokenSource {
    path: PathBuf,
    lifetime: Duration,
}

impl FileTokenSource {
    /// `lifetime` is how long a read token is trusted before re-reading.
    pub fn new(path: PathBuf, lifetime: Duration) -> Self {
        Self { path, lifetime }
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn fetch(&self) -> Result<AccessToken> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            UploadError::Auth(format!("cannot read token file {}: {}", self.path.display(), e))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(UploadError::Auth(format!(
                "token file {} is empty",
                self.path.display()
            )));
        }
        Ok(AccessToken {
            token: token.to_string(),
            expires_at: Some(Instant::now() + self.lifetime),
        })
    }
}

/// Outcome of one fetch as seen by callers that waited on it.
type SharedOutcome = std::result::Result<String, String>;

#[derive(Default)]
struct TokenSlot {
    current: Option<AccessToken>,
    /// Set while a fetch is running; resolves to that fetch's outcome.
    pending: Option<watch::Receiver<Option<SharedOutcome>>>,
}

enum Turn {
    Cached(String),
    Wait(watch::Receiver<Option<SharedOutcome>>),
    Fetch(watch::Sender<Option<SharedOutcome>>),
}

/// Caches the current token. At most one fetch runs at a time; callers
/// arriving while it runs wait for it and get its result, error included.
pub struct CachedTokenProvider<S> {
    source: S,
    slot: Mutex<TokenSlot>,
}

impl<S: TokenSource> CachedTokenProvider<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            slot: Mutex::new(TokenSlot::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_turn(&self) -> Turn {
        let mut slot = self.lock();
        if let Some(tok) = &slot.current {
            if tok.is_fresh(Instant::now()) {
                return Turn::Cached(tok.token.clone());
            }
        }
        // A closed channel means the fetching caller was dropped mid-fetch.
        if let Some(rx) = &slot.pending {
            if rx.has_changed().is_ok() {
                return Turn::Wait(rx.clone());
            }
        }
        let (tx, rx) = watch::channel(None);
        slot.pending = Some(rx);
        Turn::Fetch(tx)
    }

    async fn fetch(&self, tx: watch::Sender<Option<SharedOutcome>>) -> Result<String> {
        tracing::debug!("fetching access token");
        let fetched = self.source.fetch().await;
        let shared = {
            let mut slot = self.lock();
            slot.pending = None;
            match &fetched {
                Ok(tok) => {
                    slot.current = Some(tok.clone());
                    Ok(tok.token.clone())
                }
                Err(UploadError::Auth(msg)) => Err(msg.clone()),
                Err(e) => Err(e.to_string()),
            }
        };
        // Nobody waiting is fine.
        let _ = tx.send(Some(shared));
        fetched.map(|tok| tok.token)
    }
}

#[async_trait]
impl<S: TokenSource> AuthProvider for CachedTokenProvider<S> {
    async fn access_token(&self) -> Result<String> {
        loop {
            match self.next_turn() {
                Turn::Cached(token) => return Ok(token),
                Turn::Fetch(tx) => return self.fetch(tx).await,
                Turn::Wait(mut rx) => {
                    let outcome = match rx.wait_for(Option::is_some).await {
                        Ok(v) => v.clone(),
                        // Fetcher went away without a result; take a new turn.
                        Err(_) => continue,
                    };
                    if let Some(outcome) = outcome {
                        return outcome.map_err(UploadError::Auth);
                    }
                }
            }
        }
    }

    /// Drop the cached token (the server rejected it with 401).
    fn invalidate(&self) {
        self.lock().current = None;
    }
}
