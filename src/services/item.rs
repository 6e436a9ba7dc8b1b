//! Catalog service
//!
//! Create, read, update and soft-delete for items, with validation of the
//! user-supplied fields.

use crate::db::repositories::ItemRepository;
use crate::models::{CreateItemInput, Item, ListParams, PagedResult, UpdateItemInput};
use anyhow::Context;
use std::sync::Arc;

const NAME_MAX: usize = 255;
const DESCRIPTION_MAX: usize = 1000;
const CATEGORY_MAX: usize = 100;
const IMAGE_URL_MAX: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ItemServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Unknown or soft-deleted item
    #[error("Item not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ItemService {
    repo: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn new(repo: Arc<dyn ItemRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateItemInput) -> Result<Item, ItemServiceError> {
        validate_name(&input.name)?;
        validate_description(&input.description)?;
        validate_price(input.price)?;
        if let Some(url) = &input.image_url {
            validate_image_url(url)?;
        }
        if let Some(category) = &input.category {
            validate_category(category)?;
        }

        let item = self.repo.create(&input).await.context("Failed to create item")?;
        tracing::debug!(item_id = item.id, "Item created");
        Ok(item)
    }

    /// Get a live (not soft-deleted) item
    pub async fn get(&self, id: i64) -> Result<Item, ItemServiceError> {
        match self.repo.get_by_id(id).await.context("Failed to get item")? {
            Some(item) if !item.is_deleted() => Ok(item),
            _ => Err(ItemServiceError::NotFound),
        }
    }

    pub async fn list(
        &self,
        category: Option<&str>,
        params: ListParams,
    ) -> Result<PagedResult<Item>, ItemServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let (items, total) = self
            .repo
            .list_active(category, &params)
            .await
            .context("Failed to list items")?;
        Ok(PagedResult::new(items, total, &params))
    }

    pub async fn categories(&self) -> Result<Vec<String>, ItemServiceError> {
        Ok(self.repo.categories().await.context("Failed to list categories")?)
    }

    pub async fn update(&self, id: i64, input: UpdateItemInput) -> Result<Item, ItemServiceError> {
        let mut item = self.get(id).await?;

        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        if let Some(description) = &input.description {
            validate_description(description)?;
        }
        if let Some(price) = input.price {
            validate_price(price)?;
        }
        if let Some(url) = &input.image_url {
            validate_image_url(url)?;
        }
        if let Some(category) = &input.category {
            validate_category(category)?;
        }

        input.apply_to(&mut item);
        Ok(self.repo.update(&item).await.context("Failed to update item")?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ItemServiceError> {
        self.get(id).await?;
        self.repo.soft_delete(id).await.context("Failed to delete item")?;
        tracing::debug!(item_id = id, "Item deleted");
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<(), ItemServiceError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > NAME_MAX {
        return Err(ItemServiceError::ValidationError(format!(
            "name must be between 1 and {} characters",
            NAME_MAX
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ItemServiceError> {
    if description.chars().count() > DESCRIPTION_MAX {
        return Err(ItemServiceError::ValidationError(format!(
            "description must be at most {} characters",
            DESCRIPTION_MAX
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ItemServiceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ItemServiceError::ValidationError(
            "price must be a non-negative number".to_string(),
        ));
    }
    Ok(())
}

fn validate_image_url(url: &str) -> Result<(), ItemServiceError> {
    let has_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty());
    if !has_scheme || url.chars().count() > IMAGE_URL_MAX {
        return Err(ItemServiceError::ValidationError(
            "image_url must be an http(s) URL".to_string(),
        ));
    }
    Ok(())
}

fn validate_category(category: &str) -> Result<(), ItemServiceError> {
    if category.chars().count() > CATEGORY_MAX {
        return Err(ItemServiceError::ValidationError(format!(
            "category must be at most {} characters",
            CATEGORY_MAX
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxItemRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> ItemService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        ItemService::new(SqlxItemRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_create_validates() {
        let service = setup_test_service().await;

        let blank = service.create(CreateItemInput::new("  ", 1.0)).await;
        let negative = service.create(CreateItemInput::new("Mug", -0.01)).await;
        let bad_url = service
            .create(CreateItemInput::new("Mug", 1.0).with_image_url("ftp://x"))
            .await;

        assert!(matches!(blank, Err(ItemServiceError::ValidationError(_))));
        assert!(matches!(negative, Err(ItemServiceError::ValidationError(_))));
        assert!(matches!(bad_url, Err(ItemServiceError::ValidationError(_))));

        let free = service
            .create(CreateItemInput::new("Sticker", 0.0).with_image_url("https://x.test/a.png"))
            .await
            .expect("Zero price is allowed");
        assert!(free.is_active);
    }

    #[tokio::test]
    async fn test_get_deleted_is_not_found() {
        let service = setup_test_service().await;
        let item = service.create(CreateItemInput::new("Mug", 1.0)).await.unwrap();

        service.delete(item.id).await.expect("Failed to delete");

        assert!(matches!(service.get(item.id).await, Err(ItemServiceError::NotFound)));
        assert!(matches!(service.delete(item.id).await, Err(ItemServiceError::NotFound)));
    }

    #[tokio::test]
    async fn test_update_partial() {
        let service = setup_test_service().await;
        let item = service
            .create(CreateItemInput::new("Mug", 1.0).with_category("Home"))
            .await
            .unwrap();

        let updated = service
            .update(
                item.id,
                UpdateItemInput {
                    price: Some(3.5),
                    ..Default::default()
                },
            )
            .await
            .expect("Failed to update");

        assert_eq!(updated.price, 3.5);
        assert_eq!(updated.name, "Mug");
        assert_eq!(updated.category.as_deref(), Some("Home"));

        let bad = service
            .update(
                item.id,
                UpdateItemInput {
                    price: Some(-1.0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(bad, Err(ItemServiceError::ValidationError(_))));
        assert!(matches!(
            service.update(999, UpdateItemInput::default()).await,
            Err(ItemServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_blank_category_is_unfiltered() {
        let service = setup_test_service().await;
        service.create(CreateItemInput::new("a", 1.0).with_category("Home")).await.unwrap();
        service.create(CreateItemInput::new("b", 1.0)).await.unwrap();

        let all = service.list(Some(" "), ListParams::default()).await.unwrap();
        let home = service.list(Some("Home"), ListParams::default()).await.unwrap();

        assert_eq!(all.total, 2);
        assert_eq!(home.total, 1);
    }
}
