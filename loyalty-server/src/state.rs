//! Application state shared across all request handlers.

use loyalty_core::ledger::Ledger;
use loyalty_core::services::AccountService;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    /// Key for signing and verifying session cookies.
    pub session_key: Arc<[u8]>,
}

impl AppState {
    pub fn new(ledger: Arc<dyn Ledger>, session_key: &[u8]) -> Self {
        Self {
            accounts: Arc::new(AccountService::new(ledger)),
            session_key: Arc::from(session_key),
        }
    }
}
