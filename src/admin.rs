//! Admin capability via a one-shot key challenge.
//!
//! The capability is a single flag held in memory. Once granted it is never
//! revoked for the session; a restarted client has to challenge again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::authority::GameAuthority;

pub struct AdminAuthenticator {
    authority: Arc<dyn GameAuthority>,
    granted: AtomicBool,
}

impl AdminAuthenticator {
    #[must_use]
    pub fn new(authority: Arc<dyn GameAuthority>) -> Self {
        Self { authority, granted: AtomicBool::new(false) }
    }

    /// Exchange `key` for admin capability and return the resulting flag.
    ///
    /// No key (or an empty one) means no round trip. A failed request is
    /// logged and leaves the flag as it was.
    pub async fn challenge(&self, key: Option<&str>) -> bool {
        let Some(key) = key.filter(|k| !k.is_empty()) else {
            return self.is_admin();
        };
        if self.is_admin() {
            return true;
        }

        match self.authority.admin_challenge(key).await {
            Ok(true) => {
                self.granted.store(true, Ordering::SeqCst);
                info!("admin capability granted");
            }
            Ok(false) => warn!("admin key rejected"),
            Err(e) => warn!(error = %e, "admin challenge failed"),
        }
        self.is_admin()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
