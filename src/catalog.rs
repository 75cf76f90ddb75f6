//! Card catalog: the selectable card labels, fetched once per session.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::authority::{AuthorityError, GameAuthority};
use crate::model::CardIndex;

/// Ordered card labels. A player's selection is an index into this list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Catalog {
    labels: Vec<String>,
}

impl Catalog {
    #[must_use]
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    #[must_use]
    pub fn label(&self, index: CardIndex) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, index: CardIndex) -> bool {
        index < self.labels.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CardIndex, &str)> {
        self.labels.iter().map(String::as_str).enumerate()
    }
}

/// Lazily fetches the catalog and keeps it for the rest of the session.
pub struct GameCatalog {
    authority: Arc<dyn GameAuthority>,
    cards: OnceCell<Catalog>,
}

impl GameCatalog {
    #[must_use]
    pub fn new(authority: Arc<dyn GameAuthority>) -> Self {
        Self { authority, cards: OnceCell::new() }
    }

    /// Fetch the catalog on first use; later calls return the cached copy.
    ///
    /// # Errors
    ///
    /// Returns the authority error if the first fetch fails. A failed fetch
    /// is not cached, so the next call retries.
    pub async fn load(&self) -> Result<&Catalog, AuthorityError> {
        self.cards
            .get_or_try_init(|| async {
                let labels = self.authority.cards().await?;
                info!(count = labels.len(), "card catalog loaded");
                Ok::<_, AuthorityError>(Catalog::new(labels))
            })
            .await
    }

    /// Catalog if already loaded.
    #[must_use]
    pub fn get(&self) -> Option<&Catalog> {
        self.cards.get()
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
