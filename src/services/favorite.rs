//! Favorites service

use crate::db::repositories::{FavoriteRepository, ItemRepository};
use crate::models::Item;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum FavoriteServiceError {
    #[error("Item not found")]
    ItemNotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct FavoriteService {
    favorites: Arc<dyn FavoriteRepository>,
    items: Arc<dyn ItemRepository>,
}

impl FavoriteService {
    pub fn new(favorites: Arc<dyn FavoriteRepository>, items: Arc<dyn ItemRepository>) -> Self {
        Self { favorites, items }
    }

    /// Flip the item's favorite state for the user. Returns the new state.
    pub async fn toggle(&self, user_id: i64, item_id: i64) -> Result<bool, FavoriteServiceError> {
        match self.items.get_by_id(item_id).await.context("Failed to get item")? {
            Some(item) if !item.is_deleted() => {}
            _ => return Err(FavoriteServiceError::ItemNotFound),
        }

        if self.is_favorite(user_id, item_id).await? {
            self.favorites
                .remove(user_id, item_id)
                .await
                .context("Failed to remove favorite")?;
            Ok(false)
        } else {
            self.favorites
                .add(user_id, item_id)
                .await
                .context("Failed to add favorite")?;
            Ok(true)
        }
    }

    pub async fn is_favorite(&self, user_id: i64, item_id: i64) -> Result<bool, FavoriteServiceError> {
        Ok(self
            .favorites
            .is_favorite(user_id, item_id)
            .await
            .context("Failed to check favorite")?)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<Item>, FavoriteServiceError> {
        Ok(self
            .favorites
            .list_items(user_id)
            .await
            .context("Failed to list favorites")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxFavoriteRepository, SqlxItemRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{CreateItemInput, User};

    #[tokio::test]
    async fn test_toggle() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");
        let user = SqlxUserRepository::new(pool.clone())
            .create(&User::new("alice".into(), String::new(), "hash".into()))
            .await
            .unwrap();
        let items = SqlxItemRepository::boxed(pool.clone());
        let mug = items.create(&CreateItemInput::new("Mug", 1.0)).await.unwrap();
        let service = FavoriteService::new(SqlxFavoriteRepository::boxed(pool), items.clone());

        assert!(service.toggle(user.id, mug.id).await.unwrap());
        assert!(service.is_favorite(user.id, mug.id).await.unwrap());
        assert_eq!(service.list(user.id).await.unwrap().len(), 1);

        assert!(!service.toggle(user.id, mug.id).await.unwrap());
        assert!(service.list(user.id).await.unwrap().is_empty());

        assert!(matches!(
            service.toggle(user.id, 999).await,
            Err(FavoriteServiceError::ItemNotFound)
        ));
    }
}
