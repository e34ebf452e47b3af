//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::{AuthService, CookiePolicy, PasswordConfig};
use sesame_core::{AppConfig, SessionStore, UserStore};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Users, sessions and tokens
    pub auth: AuthService,
    /// Attributes for token cookies
    pub cookies: CookiePolicy,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Create application state over the given stores
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self::with_password_config(config, users, sessions, PasswordConfig::default())
    }

    pub fn with_password_config(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        password_config: PasswordConfig,
    ) -> Self {
        let auth = AuthService::new(users, sessions, &config.auth, password_config);
        Self {
            config,
            auth,
            cookies: CookiePolicy::default(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// In-memory state with cheap password hashing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn for_testing(config: AppConfig) -> Self {
        let store = Arc::new(sesame_core::MemoryStore::default());
        Self::with_password_config(
            config,
            store.clone(),
            store,
            PasswordConfig::insecure_fast(),
        )
    }
}
