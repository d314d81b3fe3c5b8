//! Board listings derived from the configuration store.

use std::sync::Arc;

use tracing::instrument;

use crate::{
    application::auth::{AuthError, OwnershipRepo},
    domain::boards::BoardTitleList,
    store::ConfigStore,
};

#[derive(Clone)]
pub struct BoardDirectory {
    store: Arc<ConfigStore>,
    ownership: Arc<dyn OwnershipRepo>,
}

impl BoardDirectory {
    pub fn new(store: Arc<ConfigStore>, ownership: Arc<dyn OwnershipRepo>) -> Self {
        Self { store, ownership }
    }

    /// Every board title, pseudo-boards first.
    pub fn titles(&self) -> BoardTitleList {
        self.store.board_titles()
    }

    /// Titles of the boards owned by `user_id`, in listing order.
    ///
    /// Owned ids that are no longer configured are skipped.
    #[instrument(skip(self))]
    pub async fn owned_titles(&self, user_id: &str) -> Result<BoardTitleList, AuthError> {
        let owned = self.ownership.owned_boards(user_id).await?;
        Ok(self.store.board_titles().retain_ids(&owned))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::domain::{boards::BoardConfig, global::GlobalConfig};

    struct FixedOwnership(Vec<String>);

    #[async_trait]
    impl OwnershipRepo for FixedOwnership {
        async fn owned_boards(&self, _user_id: &str) -> Result<Vec<String>, AuthError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn owned_titles_follow_listing_order() {
        let store = Arc::new(ConfigStore::new(GlobalConfig::default()).expect("store"));
        for (id, title) in [("v", "Video games"), ("a", "Anime"), ("g", "Games")] {
            store.set_board(BoardConfig::new(id, title)).expect("set");
        }
        let directory = BoardDirectory::new(
            store,
            Arc::new(FixedOwnership(vec![
                "v".to_string(),
                "a".to_string(),
                "gone".to_string(),
            ])),
        );

        let owned = directory.owned_titles("u").await.expect("owned");
        let ids: Vec<&str> = owned.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["a", "v"]);

        assert_eq!(directory.titles().len(), 5);
    }
}
