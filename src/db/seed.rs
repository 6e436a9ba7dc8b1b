//! Stock catalog
//!
//! Fills an empty catalog with a fixed set of items so a fresh install has
//! something to browse.

use anyhow::Result;

use super::repositories::{ItemRepository, SqlxItemRepository};
use super::DynDatabasePool;
use crate::models::CreateItemInput;

/// (name, description, price, unsplash photo id, category)
const STOCK_ITEMS: &[(&str, &str, f64, &str, &str)] = &[
    ("Wireless Bluetooth Headphones", "Premium noise-cancelling headphones with 30hr battery life", 149.99, "photo-1505740420928-5e560c06d30e", "Electronics"),
    ("Smart Watch Pro", "Fitness tracker with heart rate monitor and GPS", 299.99, "photo-1523275335684-37898b6baf30", "Electronics"),
    ("Laptop Backpack", "Water-resistant backpack with USB charging port", 59.99, "photo-1553062407-98eeb64c6a62", "Accessories"),
    ("Mechanical Keyboard", "RGB gaming keyboard with Cherry MX switches", 129.99, "photo-1511467687858-23d96c32e4ae", "Electronics"),
    ("Wireless Mouse", "Ergonomic wireless mouse with precision tracking", 49.99, "photo-1527864550417-7fd91fc51a46", "Electronics"),
    ("USB-C Hub", "7-in-1 USB-C hub with HDMI and card reader", 39.99, "photo-1625723044792-44de16ccb4e9", "Accessories"),
    ("Portable Charger", "20000mAh power bank with fast charging", 34.99, "photo-1609091839311-d5365f9ff1c5", "Electronics"),
    ("Webcam HD Pro", "1080p webcam with built-in microphone", 79.99, "photo-1587826080692-f439cd0b70da", "Electronics"),
    ("Desk Lamp LED", "Adjustable LED desk lamp with touch control", 29.99, "photo-1507473885765-e6ed057f782c", "Home"),
    ("Coffee Mug Warmer", "Electric mug warmer with auto shut-off", 24.99, "photo-1514228742587-6b1558fcca3d", "Home"),
    ("Notebook Set", "Premium leather-bound notebook with pen", 19.99, "photo-1531346878377-a5be20888e57", "Office"),
    ("Phone Stand", "Adjustable aluminum phone and tablet stand", 15.99, "photo-1586105251261-72a756497a11", "Accessories"),
    ("Smart Thermostat", "Wi-Fi enabled smart thermostat for home automation", 199.99, "photo-1563461661026-6b2c5c9930f7", "Home"),
    ("Gaming Headset", "Surround sound gaming headset with microphone", 89.99, "photo-1618366712010-f4ae9c647dcb", "Electronics"),
    ("External SSD 1TB", "High-speed portable external solid state drive", 129.99, "photo-1597872252721-24642f56f180", "Electronics"),
    ("Bluetooth Speaker", "Portable waterproof bluetooth speaker", 79.99, "photo-1608043152269-423dbba4e7e1", "Electronics"),
    ("Monitor Stand", "Dual monitor mount with gas spring arms", 69.99, "photo-1593640408182-31c70c8268f5", "Office"),
    ("Wireless Charger", "Fast wireless charging pad for smartphones", 29.99, "photo-1586953208448-b95a79798f07", "Accessories"),
    ("Drone Camera", "4K camera drone with stabilization", 499.99, "photo-1507582020474-9a35b7d450d7", "Electronics"),
    ("VR Headset", "Virtual reality headset with controllers", 399.99, "photo-1622979135225-d2ba269fb1bd", "Electronics"),
];

fn image_url(photo_id: &str) -> String {
    format!("https://images.unsplash.com/{}?w=400", photo_id)
}

/// Insert the stock items if the catalog has no live items.
///
/// Returns the number of items inserted.
pub async fn seed_items(pool: &DynDatabasePool) -> Result<usize> {
    let repo = SqlxItemRepository::new(pool.clone());

    let existing = repo.count().await?;
    if existing > 0 {
        tracing::debug!(existing, "Catalog not empty, skipping seed");
        return Ok(0);
    }

    for (name, description, price, photo, category) in STOCK_ITEMS {
        let input = CreateItemInput::new(*name, *price)
            .with_description(*description)
            .with_image_url(image_url(photo))
            .with_category(*category);
        repo.create(&input).await?;
    }

    tracing::info!("Seeded {} catalog items", STOCK_ITEMS.len());
    Ok(STOCK_ITEMS.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::ListParams;

    #[tokio::test]
    async fn test_seed_items_once() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        assert_eq!(seed_items(&pool).await.expect("Failed to seed"), 20);
        assert_eq!(seed_items(&pool).await.expect("Failed to seed"), 0);

        let repo = SqlxItemRepository::new(pool);
        let (items, total) = repo.list_active(None, &ListParams::default()).await.unwrap();
        assert_eq!(total, 20);
        assert!(items.iter().all(|i| i.price > 0.0 && i.image_url.is_some()));
        assert_eq!(
            repo.categories().await.unwrap(),
            vec!["Accessories", "Electronics", "Home", "Office"]
        );
    }

    #[test]
    fn test_image_url() {
        assert_eq!(
            image_url("photo-1"),
            "https://images.unsplash.com/photo-1?w=400"
        );
    }
}
