use mercato_catalog::{
    gallery, stock_status, Category, InventoryRecord, InventoryUpdate, Product, ProductDetail, ProductDraft,
    ProductFeature, ProductImage, ProductQuery, ProductSpecification, ProductUpdate, StockStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::repository::{CatalogRepository, EngagementRepository};
use crate::{CoreError, CoreResult, MerchantActor};

/// A product as it appears in listings.
#[derive(Debug, Clone, Serialize)]
pub struct ProductListing {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: Decimal,
    pub primary_image: Option<String>,
    pub stock_status: StockStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewImage {
    pub url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSpecification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFeature {
    pub name: String,
}

/// Public browsing plus merchant-side product management.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogRepository>,
    engagement: Arc<dyn EngagementRepository>,
}

impl CatalogService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, engagement: Arc<dyn EngagementRepository>) -> Self {
        Self { catalog, engagement }
    }

    pub async fn browse(&self, query: &ProductQuery) -> CoreResult<Vec<ProductListing>> {
        let products = self.catalog.list_products(query).await?;
        self.listings(products).await
    }

    pub async fn listings(&self, products: Vec<Product>) -> CoreResult<Vec<ProductListing>> {
        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let mut images = self.catalog.primary_images(&ids).await?;
        let inventories = self.catalog.get_inventories(&ids).await?;

        Ok(products
            .into_iter()
            .map(|product| ProductListing {
                effective_price: product.effective_price(),
                primary_image: images.remove(&product.id),
                stock_status: stock_status(inventories.get(&product.id), product.stock),
                product,
            })
            .collect())
    }

    /// Product page. Inactive products are hidden from the public.
    pub async fn detail(&self, product_id: Uuid) -> CoreResult<ProductDetail> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::NotFound(format!("Product {}", product_id)))?;

        let images = self.catalog.list_images(product_id).await?;
        let specifications = self.catalog.list_specifications(product_id).await?;
        let features = self.catalog.list_features(product_id).await?;
        let inventory = self.catalog.get_inventory(product_id).await?;
        let rating = self.engagement.product_rating(product_id).await?;

        Ok(ProductDetail {
            effective_price: product.effective_price(),
            stock_status: stock_status(inventory.as_ref(), product.stock),
            product,
            images,
            specifications,
            features,
            inventory,
            rating,
        })
    }

    pub async fn categories(&self) -> CoreResult<Vec<Category>> {
        Ok(self.catalog.list_categories().await?)
    }

    pub async fn category_products(&self, category_id: Uuid, query: ProductQuery) -> CoreResult<Vec<ProductListing>> {
        if self.catalog.get_category(category_id).await?.is_none() {
            return Err(CoreError::NotFound(format!("Category {}", category_id)));
        }
        self.browse(&ProductQuery { category_id: Some(category_id), ..query }).await
    }

    pub async fn merchant_products(&self, actor: MerchantActor) -> CoreResult<Vec<ProductListing>> {
        let products = self.catalog.list_merchant_products(actor.merchant_id).await?;
        self.listings(products).await
    }

    pub async fn create_product(&self, actor: MerchantActor, draft: ProductDraft) -> CoreResult<Product> {
        if self.catalog.get_category(draft.category_id).await?.is_none() {
            return Err(CoreError::Validation(format!("category {} does not exist", draft.category_id)));
        }
        let product = Product::new(actor.merchant_id, draft)?;
        self.catalog.insert_product(&product).await?;
        self.catalog.upsert_inventory(&InventoryRecord::new(product.id)).await?;
        tracing::info!(product_id = %product.id, merchant_id = %actor.merchant_id, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, actor: MerchantActor, product_id: Uuid, update: ProductUpdate) -> CoreResult<Product> {
        let mut product = self.owned_product(actor, product_id).await?;
        if let Some(category_id) = update.category_id {
            if self.catalog.get_category(category_id).await?.is_none() {
                return Err(CoreError::Validation(format!("category {} does not exist", category_id)));
            }
        }
        product.apply(update)?;
        self.catalog.update_product(&product).await?;
        tracing::info!(%product_id, "Product updated");
        Ok(product)
    }

    /// Soft delete: the product disappears from listings, order history keeps it.
    pub async fn deactivate_product(&self, actor: MerchantActor, product_id: Uuid) -> CoreResult<Product> {
        let mut product = self.owned_product(actor, product_id).await?;
        product.deactivate();
        self.catalog.update_product(&product).await?;
        tracing::info!(%product_id, "Product deactivated");
        Ok(product)
    }

    pub async fn add_image(&self, actor: MerchantActor, product_id: Uuid, image: NewImage) -> CoreResult<ProductImage> {
        self.owned_product(actor, product_id).await?;
        let mut images = self.catalog.list_images(product_id).await?;
        let image = ProductImage::new(product_id, image.url, image.alt_text, image.is_primary, gallery::next_position(&images))?;
        let image_id = image.id;
        gallery::add(&mut images, image);
        self.catalog.save_images(product_id, &images).await?;

        images
            .into_iter()
            .find(|i| i.id == image_id)
            .ok_or_else(|| CoreError::Storage("image vanished after save".to_string()))
    }

    pub async fn set_primary_image(&self, actor: MerchantActor, product_id: Uuid, image_id: Uuid) -> CoreResult<Vec<ProductImage>> {
        self.owned_product(actor, product_id).await?;
        let mut images = self.catalog.list_images(product_id).await?;
        if !gallery::set_primary(&mut images, image_id) {
            return Err(CoreError::NotFound(format!("Image {}", image_id)));
        }
        self.catalog.save_images(product_id, &images).await?;
        gallery::arrange(&mut images);
        Ok(images)
    }

    pub async fn remove_image(&self, actor: MerchantActor, product_id: Uuid, image_id: Uuid) -> CoreResult<Vec<ProductImage>> {
        self.owned_product(actor, product_id).await?;
        let mut images = self.catalog.list_images(product_id).await?;
        if !gallery::remove(&mut images, image_id) {
            return Err(CoreError::NotFound(format!("Image {}", image_id)));
        }
        self.catalog.save_images(product_id, &images).await?;
        gallery::arrange(&mut images);
        Ok(images)
    }

    pub async fn add_specification(&self, actor: MerchantActor, product_id: Uuid, spec: NewSpecification) -> CoreResult<ProductSpecification> {
        self.owned_product(actor, product_id).await?;
        let spec = ProductSpecification::new(product_id, spec.title, spec.body)?;
        self.catalog.insert_specification(&spec).await?;
        Ok(spec)
    }

    pub async fn remove_specification(&self, actor: MerchantActor, product_id: Uuid, spec_id: Uuid) -> CoreResult<()> {
        self.owned_product(actor, product_id).await?;
        if !self.catalog.delete_specification(product_id, spec_id).await? {
            return Err(CoreError::NotFound(format!("Specification {}", spec_id)));
        }
        Ok(())
    }

    pub async fn add_feature(&self, actor: MerchantActor, product_id: Uuid, feature: NewFeature) -> CoreResult<ProductFeature> {
        self.owned_product(actor, product_id).await?;
        let feature = ProductFeature::new(product_id, feature.name)?;
        self.catalog.insert_feature(&feature).await?;
        Ok(feature)
    }

    pub async fn remove_feature(&self, actor: MerchantActor, product_id: Uuid, feature_id: Uuid) -> CoreResult<()> {
        self.owned_product(actor, product_id).await?;
        if !self.catalog.delete_feature(product_id, feature_id).await? {
            return Err(CoreError::NotFound(format!("Feature {}", feature_id)));
        }
        Ok(())
    }

    pub async fn update_inventory(&self, actor: MerchantActor, product_id: Uuid, update: InventoryUpdate) -> CoreResult<InventoryRecord> {
        self.owned_product(actor, product_id).await?;
        let mut record = self
            .catalog
            .get_inventory(product_id)
            .await?
            .unwrap_or_else(|| InventoryRecord::new(product_id));
        record.apply(update).map_err(CoreError::Validation)?;
        self.catalog.upsert_inventory(&record).await?;
        Ok(record)
    }

    async fn owned_product(&self, actor: MerchantActor, product_id: Uuid) -> CoreResult<Product> {
        let product = self
            .catalog
            .get_product(product_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Product {}", product_id)))?;
        if product.merchant_id != actor.merchant_id {
            tracing::warn!(%product_id, merchant_id = %actor.merchant_id, "Merchant tried to modify a foreign product");
            return Err(CoreError::Forbidden("product belongs to another merchant".to_string()));
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::testing;

    fn service(store: &Arc<InMemoryStore>) -> CatalogService {
        CatalogService::new(store.clone(), store.clone())
    }

    fn image(url: &str, is_primary: bool) -> NewImage {
        NewImage { url: url.to_string(), alt_text: String::new(), is_primary }
    }

    #[tokio::test]
    async fn test_create_product_requires_known_category() {
        let store = testing::store();
        let svc = service(&store);
        let merchant = testing::merchant(&store, "North Loom").await;
        let category = testing::category(&store, "Home").await;

        let product = svc.create_product(merchant, testing::draft("Rug", category.id, 12000)).await.unwrap();
        assert_eq!(product.merchant_id, merchant.merchant_id);
        assert!(store.get_inventory(product.id).await.unwrap().is_some());

        let result = svc.create_product(merchant, testing::draft("Rug", Uuid::new_v4(), 12000)).await;
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_only_owner_may_manage() {
        let store = testing::store();
        let svc = service(&store);
        let owner = testing::merchant(&store, "North Loom").await;
        let other = testing::merchant(&store, "South Kiln").await;
        let product = testing::product(&store, owner.merchant_id, "Vase", 3000).await;

        let result = svc.update_product(other, product.id, ProductUpdate { stock: Some(1), ..Default::default() }).await;
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
        assert!(matches!(svc.deactivate_product(other, product.id).await, Err(CoreError::Forbidden(_))));
        assert!(matches!(svc.deactivate_product(owner, Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deactivated_product_hidden_from_public() {
        let store = testing::store();
        let svc = service(&store);
        let merchant = testing::merchant(&store, "North Loom").await;
        let product = testing::product(&store, merchant.merchant_id, "Vase", 3000).await;

        assert_eq!(svc.browse(&ProductQuery::default()).await.unwrap().len(), 1);
        svc.deactivate_product(merchant, product.id).await.unwrap();
        assert!(svc.browse(&ProductQuery::default()).await.unwrap().is_empty());
        assert!(matches!(svc.detail(product.id).await, Err(CoreError::NotFound(_))));
        assert_eq!(svc.merchant_products(merchant).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_image_primary_rules() {
        let store = testing::store();
        let svc = service(&store);
        let merchant = testing::merchant(&store, "North Loom").await;
        let product = testing::product(&store, merchant.merchant_id, "Vase", 3000).await;

        let first = svc.add_image(merchant, product.id, image("https://cdn.example.com/1.jpg", false)).await.unwrap();
        assert!(first.is_primary);
        let second = svc.add_image(merchant, product.id, image("https://cdn.example.com/2.jpg", false)).await.unwrap();
        assert!(!second.is_primary);
        assert_eq!(second.position, 1);

        let images = svc.set_primary_image(merchant, product.id, second.id).await.unwrap();
        assert_eq!(images[0].id, second.id);
        assert_eq!(images.iter().filter(|i| i.is_primary).count(), 1);

        let images = svc.remove_image(merchant, product.id, second.id).await.unwrap();
        assert_eq!(images.len(), 1);
        assert!(images[0].is_primary);

        let listing = svc.browse(&ProductQuery::default()).await.unwrap();
        assert_eq!(listing[0].primary_image.as_deref(), Some("https://cdn.example.com/1.jpg"));
    }

    #[tokio::test]
    async fn test_detail_collects_everything() {
        let store = testing::store();
        let svc = service(&store);
        let merchant = testing::merchant(&store, "North Loom").await;
        let product = testing::product(&store, merchant.merchant_id, "Vase", 3000).await;

        svc.add_specification(merchant, product.id, NewSpecification { title: "Height".into(), body: "30cm".into() })
            .await
            .unwrap();
        let feature = svc.add_feature(merchant, product.id, NewFeature { name: "Hand-thrown".into() }).await.unwrap();
        svc.update_inventory(
            merchant,
            product.id,
            InventoryUpdate { sku: Some("VASE-30".into()), low_stock_threshold: Some(20), track_inventory: None },
        )
        .await
        .unwrap();

        let detail = svc.detail(product.id).await.unwrap();
        assert_eq!(detail.specifications.len(), 1);
        assert_eq!(detail.features.len(), 1);
        assert_eq!(detail.stock_status, StockStatus::LowStock);
        assert_eq!(detail.inventory.as_ref().map(|i| i.sku.as_str()), Some("VASE-30"));
        assert_eq!(detail.rating.count, 0);

        svc.remove_feature(merchant, product.id, feature.id).await.unwrap();
        assert!(matches!(svc.remove_feature(merchant, product.id, feature.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_category_listing() {
        let store = testing::store();
        let svc = service(&store);
        let merchant = testing::merchant(&store, "North Loom").await;
        let home = testing::category(&store, "Home").await;
        testing::category(&store, "Apparel").await;
        svc.create_product(merchant, testing::draft("Rug", home.id, 12000)).await.unwrap();

        let names: Vec<String> = svc.categories().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Apparel", "Home"]);
        assert_eq!(svc.category_products(home.id, ProductQuery::default()).await.unwrap().len(), 1);
        assert!(matches!(
            svc.category_products(Uuid::new_v4(), ProductQuery::default()).await,
            Err(CoreError::NotFound(_))
        ));
    }
}
