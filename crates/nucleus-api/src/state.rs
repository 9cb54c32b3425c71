//! Application state

use nucleus_auth::{Authenticator, Clock, JwtManager, LockoutPolicy, LoginService};
use nucleus_db::Database;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub authenticator: Authenticator,
    pub login: LoginService,
}

impl AppState {
    pub fn new(
        db: Database,
        jwt: Arc<JwtManager>,
        policy: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(db.clone());
        Self {
            authenticator: Authenticator::new(jwt.clone(), store.clone()),
            login: LoginService::new(store, jwt, policy, clock),
            db,
        }
    }
}
