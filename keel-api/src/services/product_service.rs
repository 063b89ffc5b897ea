//! Product Service

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{validate_description, validate_name};
use keel_core::{Product, ProductId, Record, TenantId};
use keel_storage::{RecordStore, RecordStoreExt};

use super::{cascade, list_page, save, updated_description, updated_name};
use crate::error::ApiResult;
use crate::types::{
    CreateProductRequest, DeleteResponse, ListParams, ListResponse, UpdateProductRequest,
};

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn RecordStore>,
}

impl ProductService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, tenant_id: TenantId, req: CreateProductRequest) -> ApiResult<Product> {
        let now = Utc::now();
        let product = Product {
            product_id: ProductId::now_v7(),
            tenant_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&product).await?;
        tracing::info!(%tenant_id, product_id = %product.product_id, "Product created");
        Ok(product)
    }

    pub async fn get(&self, tenant_id: TenantId, product_id: ProductId) -> ApiResult<Product> {
        Ok(self
            .store
            .require_record::<Product>(tenant_id, product_id.as_uuid())
            .await?)
    }

    pub async fn list(&self, tenant_id: TenantId, params: ListParams) -> ApiResult<ListResponse<Product>> {
        list_page(self.store.as_ref(), tenant_id, None, params).await
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        req: UpdateProductRequest,
    ) -> ApiResult<Product> {
        let mut product = self.get(tenant_id, product_id).await?;
        updated_name(&mut product.name, req.name.as_ref())?;
        updated_description(&mut product.description, req.description.as_ref())?;
        product.touch(Utc::now());
        save(self.store.as_ref(), &product).await?;
        Ok(product)
    }

    /// Delete the product with its interfaces, features, requirements and releases.
    pub async fn delete(&self, tenant_id: TenantId, product_id: ProductId) -> ApiResult<DeleteResponse> {
        let deleted = cascade::delete_product(self.store.as_ref(), tenant_id, product_id.as_uuid()).await?;
        tracing::info!(%tenant_id, %product_id, deleted, "Product deleted");
        Ok(DeleteResponse {
            deleted,
            ..DeleteResponse::default()
        })
    }
}
