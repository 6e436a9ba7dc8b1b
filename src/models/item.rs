//! Catalog item model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog entry.
///
/// Items are never physically removed; a delete sets `deleted_at` and clears
/// `is_active` so cart lines and order snapshots keep their reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Unit price, never negative
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Whether the item has been soft-deleted
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether the item can be put in a cart
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_deleted()
    }
}

/// Input for creating an item
#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

impl CreateItemInput {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price,
            image_url: None,
            category: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Partial update of an item; `None` leaves the field unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateItemInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateItemInput {
    /// Apply the update to an item in place
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(image_url) = &self.image_url {
            item.image_url = Some(image_url.clone());
        }
        if let Some(category) = &self.category {
            item.category = Some(category.clone());
        }
        if let Some(is_active) = self.is_active {
            item.is_active = is_active;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
            && self.category.is_none()
            && self.is_active.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        let now = Utc::now();
        Item {
            id: 1,
            name: "Mug".to_string(),
            description: String::new(),
            price: 10.0,
            image_url: None,
            category: Some("Home".to_string()),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_is_available() {
        let mut item = item();
        assert!(item.is_available());

        item.is_active = false;
        assert!(!item.is_available());

        item.is_active = true;
        item.deleted_at = Some(Utc::now());
        assert!(item.is_deleted());
        assert!(!item.is_available());
    }

    #[test]
    fn test_update_apply_partial() {
        let mut item = item();
        let update = UpdateItemInput {
            price: Some(12.5),
            ..Default::default()
        };

        update.apply_to(&mut item);

        assert_eq!(item.price, 12.5);
        assert_eq!(item.name, "Mug");
        assert_eq!(item.category.as_deref(), Some("Home"));
    }

    #[test]
    fn test_update_is_empty() {
        assert!(UpdateItemInput::default().is_empty());
        assert!(!UpdateItemInput {
            is_active: Some(false),
            ..Default::default()
        }
        .is_empty());
    }

    #[test]
    fn test_create_input_builder() {
        let input = CreateItemInput::new("Lamp", 29.99)
            .with_description("LED")
            .with_category("Home");

        assert_eq!(input.name, "Lamp");
        assert_eq!(input.description, "LED");
        assert_eq!(input.category.as_deref(), Some("Home"));
        assert!(input.image_url.is_none());
    }
}
