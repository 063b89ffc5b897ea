//! Interface Service

use std::sync::Arc;

use chrono::Utc;
use keel_core::validation::{validate_description, validate_name};
use keel_core::{Interface, InterfaceId, Product, ProductId, Record, TenantId};
use keel_storage::{RecordStore, RecordStoreExt};

use super::{cascade, list_page, save, updated_description, updated_name};
use crate::error::ApiResult;
use crate::types::{
    CreateInterfaceRequest, DeleteResponse, ListParams, ListResponse, UpdateInterfaceRequest,
};

#[derive(Clone)]
pub struct InterfaceService {
    store: Arc<dyn RecordStore>,
}

impl InterfaceService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create an interface under a product of the same tenant.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        req: CreateInterfaceRequest,
    ) -> ApiResult<Interface> {
        self.store
            .require_record::<Product>(tenant_id, product_id.as_uuid())
            .await?;

        let now = Utc::now();
        let interface = Interface {
            interface_id: InterfaceId::now_v7(),
            tenant_id,
            product_id,
            name: validate_name("name", &req.name)?,
            description: validate_description("description", &req.description)?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&interface).await?;
        tracing::info!(%tenant_id, %product_id, interface_id = %interface.interface_id, "Interface created");
        Ok(interface)
    }

    pub async fn get(&self, tenant_id: TenantId, interface_id: InterfaceId) -> ApiResult<Interface> {
        Ok(self
            .store
            .require_record::<Interface>(tenant_id, interface_id.as_uuid())
            .await?)
    }

    /// Interfaces of a product. A product of another tenant is 404.
    pub async fn list_by_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        params: ListParams,
    ) -> ApiResult<ListResponse<Interface>> {
        self.store
            .require_record::<Product>(tenant_id, product_id.as_uuid())
            .await?;
        list_page(self.store.as_ref(), tenant_id, Some(product_id.as_uuid()), params).await
    }

    pub async fn update(
        &self,
        tenant_id: TenantId,
        interface_id: InterfaceId,
        req: UpdateInterfaceRequest,
    ) -> ApiResult<Interface> {
        let mut interface = self.get(tenant_id, interface_id).await?;
        updated_name(&mut interface.name, req.name.as_ref())?;
        updated_description(&mut interface.description, req.description.as_ref())?;
        interface.touch(Utc::now());
        save(self.store.as_ref(), &interface).await?;
        Ok(interface)
    }

    pub async fn delete(
        &self,
        tenant_id: TenantId,
        interface_id: InterfaceId,
    ) -> ApiResult<DeleteResponse> {
        let deleted =
            cascade::delete_interface(self.store.as_ref(), tenant_id, interface_id.as_uuid()).await?;
        tracing::info!(%tenant_id, %interface_id, deleted, "Interface deleted");
        Ok(DeleteResponse {
            deleted,
            ..DeleteResponse::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::ProductService;
    use crate::types::CreateProductRequest;
    use keel_storage::InMemoryStore;

    async fn setup() -> (InterfaceService, TenantId, ProductId) {
        let store: Arc<dyn RecordStore> = Arc::new(InMemoryStore::new());
        let tenant = TenantId::now_v7();
        let product = ProductService::new(store.clone())
            .create(
                tenant,
                CreateProductRequest {
                    name: "Atlas".to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        (InterfaceService::new(store), tenant, product.product_id)
    }

    fn req(name: &str) -> CreateInterfaceRequest {
        CreateInterfaceRequest {
            name: name.to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_requires_product_in_tenant() {
        let (svc, tenant, product_id) = setup().await;
        assert!(svc.create(tenant, product_id, req("Web")).await.is_ok());

        let err = svc
            .create(TenantId::now_v7(), product_id, req("Web"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);

        let err = svc
            .create(tenant, ProductId::now_v7(), req("Web"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_list_by_product_only_lists_children() {
        let (svc, tenant, product_id) = setup().await;
        svc.create(tenant, product_id, req("Web")).await.unwrap();
        svc.create(tenant, product_id, req("iOS")).await.unwrap();

        let page = svc
            .list_by_product(tenant, product_id, ListParams::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Web");
    }
}
