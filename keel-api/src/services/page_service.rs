//! Page Service
//!
//! Generic page tree. Siblings are ordered by `position` (then `created_at`)
//! and positions stay contiguous from zero after every create, move and
//! delete. Structural changes take a process-wide lock so concurrent moves
//! cannot interleave their renumbering.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use keel_core::tree::{self, build_tree};
use keel_core::validation::validate_name;
use keel_core::{Page, PageId, PageType, Record, TenantId, Timestamp, TreeError, TreeView};
use keel_storage::{RecordQuery, RecordStore, RecordStoreExt};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Mutex;

use super::save;
use crate::error::{ApiError, ApiResult};
use crate::types::{CreatePageRequest, DeleteResponse, MovePageRequest, UpdatePageRequest};

#[derive(Clone)]
pub struct PageService {
    store: Arc<dyn RecordStore>,
    tree_lock: Arc<Mutex<()>>,
}

/// Shallow merge: `null` removes a key, anything else replaces it.
pub fn merge_properties(target: &mut Map<String, JsonValue>, patch: Map<String, JsonValue>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

fn sort_siblings(pages: &mut [Page]) {
    pages.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.page_id.cmp(&b.page_id))
    });
}

/// Sorted children of `parent` (`None` = root pages) from a tenant's full page set.
fn children_of(all: &[Page], parent: Option<PageId>) -> Vec<Page> {
    let mut kids: Vec<Page> = all
        .iter()
        .filter(|p| p.parent_id == parent)
        .cloned()
        .collect();
    sort_siblings(&mut kids);
    kids
}

/// Assign positions 0..n in order; returns the pages whose position changed.
fn renumber(siblings: Vec<Page>, now: Timestamp) -> Vec<Page> {
    siblings
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut page)| {
            let position = index as u32;
            if page.position == position {
                None
            } else {
                page.position = position;
                page.touch(now);
                Some(page)
            }
        })
        .collect()
}

fn check_nesting(parent: Option<&Page>, child: PageType) -> Result<(), TreeError> {
    match parent {
        Some(parent) if !parent.page_type.can_contain(child) => Err(TreeError::InvalidNesting {
            parent: parent.page_type.to_string(),
            child: child.to_string(),
        }),
        None if !child.can_be_root() => Err(TreeError::InvalidRoot {
            page_type: child.to_string(),
        }),
        _ => Ok(()),
    }
}

impl PageService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            tree_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn all_pages(&self, tenant_id: TenantId) -> ApiResult<Vec<Page>> {
        Ok(self
            .store
            .list_records::<Page>(tenant_id, &RecordQuery::all())
            .await?)
    }

    async fn save_all(&self, pages: &[Page]) -> ApiResult<()> {
        for page in pages {
            save(self.store.as_ref(), page).await?;
        }
        Ok(())
    }

    /// Create a page as the last child of its parent.
    pub async fn create(&self, tenant_id: TenantId, req: CreatePageRequest) -> ApiResult<Page> {
        let title = validate_name("title", &req.title)?;
        let _guard = self.tree_lock.lock().await;

        let parent = match req.parent_id {
            Some(parent_id) => Some(self.get(tenant_id, parent_id).await?),
            None => None,
        };
        check_nesting(parent.as_ref(), req.page_type)?;

        let position = match req.parent_id {
            Some(parent_id) => {
                self.store
                    .count(
                        Page::KIND,
                        tenant_id,
                        &RecordQuery::children_of(parent_id.as_uuid()),
                    )
                    .await?
            }
            None => self
                .all_pages(tenant_id)
                .await?
                .iter()
                .filter(|p| p.parent_id.is_none())
                .count() as u64,
        };

        let now = Utc::now();
        let page = Page {
            page_id: PageId::now_v7(),
            tenant_id,
            parent_id: req.parent_id,
            page_type: req.page_type,
            title,
            properties: req.properties,
            blocks: req.blocks,
            position: u32::try_from(position)
                .map_err(|_| ApiError::state_conflict("Too many sibling pages"))?,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_record(&page).await?;
        tracing::info!(
            %tenant_id,
            page_id = %page.page_id,
            page_type = %page.page_type,
            position = page.position,
            "Page created"
        );
        Ok(page)
    }

    pub async fn get(&self, tenant_id: TenantId, page_id: PageId) -> ApiResult<Page> {
        Ok(self
            .store
            .require_record::<Page>(tenant_id, page_id.as_uuid())
            .await?)
    }

    /// Direct children in sibling order; `None` lists root pages.
    pub async fn list_children(
        &self,
        tenant_id: TenantId,
        parent_id: Option<PageId>,
    ) -> ApiResult<Vec<Page>> {
        match parent_id {
            Some(parent_id) => {
                self.get(tenant_id, parent_id).await?;
                let mut kids = self
                    .store
                    .list_records::<Page>(tenant_id, &RecordQuery::children_of(parent_id.as_uuid()))
                    .await?;
                sort_siblings(&mut kids);
                Ok(kids)
            }
            None => Ok(children_of(&self.all_pages(tenant_id).await?, None)),
        }
    }

    /// Nested view of the subtree at `root`, or of every root page.
    pub async fn tree(
        &self,
        tenant_id: TenantId,
        root: Option<PageId>,
    ) -> ApiResult<Vec<TreeView<Page>>> {
        let mut all = self.all_pages(tenant_id).await?;
        sort_siblings(&mut all);

        match root {
            Some(root_id) => {
                let node = all
                    .iter()
                    .find(|p| p.page_id == root_id)
                    .cloned()
                    .ok_or_else(|| ApiError::entity_not_found("Page", root_id))?;
                let children = build_tree(&all, Some(root_id.as_uuid()));
                Ok(vec![TreeView { node, children }])
            }
            None => Ok(build_tree(&all, None)),
        }
    }

    /// Breadcrumb from the root page down to the page's parent.
    pub async fn ancestors(&self, tenant_id: TenantId, page_id: PageId) -> ApiResult<Vec<Page>> {
        let all = self.all_pages(tenant_id).await?;
        if !all.iter().any(|p| p.page_id == page_id) {
            return Err(ApiError::entity_not_found("Page", page_id));
        }
        let chain = tree::ancestors(&all, page_id.as_uuid())?;
        let by_id: HashMap<_, _> = all.into_iter().map(|p| (p.page_id.as_uuid(), p)).collect();
        Ok(chain.iter().filter_map(|id| by_id.get(id).cloned()).collect())
    }

    /// Update title, properties (merged) and blocks (replaced).
    ///
    /// The row is read under the tree lock so a concurrent move's parent and
    /// position are never written back stale.
    pub async fn update(
        &self,
        tenant_id: TenantId,
        page_id: PageId,
        req: UpdatePageRequest,
    ) -> ApiResult<Page> {
        let title = req
            .title
            .as_deref()
            .map(|title| validate_name("title", title))
            .transpose()?;
        let _guard = self.tree_lock.lock().await;
        let mut page = self.get(tenant_id, page_id).await?;
        if let Some(title) = title {
            page.title = title;
        }
        if let Some(properties) = req.properties {
            merge_properties(&mut page.properties, properties);
        }
        if let Some(blocks) = req.blocks {
            page.blocks = blocks;
        }
        page.touch(Utc::now());
        save(self.store.as_ref(), &page).await?;
        Ok(page)
    }

    /// Re-parent and/or reposition a page.
    ///
    /// An absent `parent_id` keeps the current parent; `null` moves to the
    /// top level. Rejects moves under the page itself or its descendants and
    /// moves that break the nesting rules. Both the old and the new sibling
    /// lists are renumbered contiguously.
    pub async fn move_page(
        &self,
        tenant_id: TenantId,
        page_id: PageId,
        req: MovePageRequest,
    ) -> ApiResult<Page> {
        let _guard = self.tree_lock.lock().await;
        let all = self.all_pages(tenant_id).await?;
        let mut page = all
            .iter()
            .find(|p| p.page_id == page_id)
            .cloned()
            .ok_or_else(|| ApiError::entity_not_found("Page", page_id))?;
        let target = req.parent_id.unwrap_or(page.parent_id);

        let new_parent = match target {
            Some(parent_id) => Some(
                all.iter()
                    .find(|p| p.page_id == parent_id)
                    .cloned()
                    .ok_or_else(|| ApiError::entity_not_found("Page", parent_id))?,
            ),
            None => None,
        };
        tree::check_reparent(&all, page_id.as_uuid(), target.map(|id| id.as_uuid()))?;
        check_nesting(new_parent.as_ref(), page.page_type)?;

        let now = Utc::now();
        let old_parent = page.parent_id;
        let mut siblings: Vec<Page> = children_of(&all, target)
            .into_iter()
            .filter(|p| p.page_id != page_id)
            .collect();
        let index = req
            .position
            .map(|p| p as usize)
            .unwrap_or(siblings.len())
            .min(siblings.len());

        page.parent_id = target;
        page.touch(now);
        siblings.insert(index, page.clone());

        let mut changed = renumber(siblings, now);
        if old_parent != target {
            let old_siblings = children_of(&all, old_parent)
                .into_iter()
                .filter(|p| p.page_id != page_id)
                .collect();
            changed.extend(renumber(old_siblings, now));
        }
        // The moved page changed parent even if its index did not.
        if !changed.iter().any(|p| p.page_id == page_id) {
            page.position = index as u32;
            changed.push(page.clone());
        }
        self.save_all(&changed).await?;

        let moved = changed
            .into_iter()
            .find(|p| p.page_id == page_id)
            .unwrap_or(page);
        tracing::info!(
            %tenant_id,
            %page_id,
            parent_id = ?moved.parent_id,
            position = moved.position,
            "Page moved"
        );
        Ok(moved)
    }

    /// Delete a page and all its descendants, then close the gap among its siblings.
    pub async fn delete(&self, tenant_id: TenantId, page_id: PageId) -> ApiResult<DeleteResponse> {
        let _guard = self.tree_lock.lock().await;
        let all = self.all_pages(tenant_id).await?;
        let page = all
            .iter()
            .find(|p| p.page_id == page_id)
            .cloned()
            .ok_or_else(|| ApiError::entity_not_found("Page", page_id))?;

        let mut deleted = 0;
        for id in tree::descendants(&all, page_id.as_uuid()).into_iter().rev() {
            if self.store.delete_record::<Page>(tenant_id, id).await? {
                deleted += 1;
            }
        }
        if !self
            .store
            .delete_record::<Page>(tenant_id, page_id.as_uuid())
            .await?
        {
            return Err(ApiError::entity_not_found("Page", page_id));
        }
        deleted += 1;

        let remaining: Vec<Page> = children_of(&all, page.parent_id)
            .into_iter()
            .filter(|p| p.page_id != page_id)
            .collect();
        let renumbered = renumber(remaining, Utc::now());
        self.save_all(&renumbered).await?;

        tracing::info!(%tenant_id, %page_id, deleted, "Page deleted");
        Ok(DeleteResponse {
            deleted,
            renumbered: renumbered.len() as u64,
            ..DeleteResponse::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::services::testing::GatedStore;
    use keel_storage::InMemoryStore;
    use serde_json::json;

    fn service() -> PageService {
        PageService::new(Arc::new(InMemoryStore::new()))
    }

    fn req(parent_id: Option<PageId>, page_type: PageType, title: &str) -> CreatePageRequest {
        CreatePageRequest {
            parent_id,
            page_type,
            title: title.to_string(),
            properties: Map::new(),
            blocks: Vec::new(),
        }
    }

    fn titles(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.title.as_str()).collect()
    }

    fn positions(pages: &[Page]) -> Vec<u32> {
        pages.iter().map(|p| p.position).collect()
    }

    #[tokio::test]
    async fn test_create_appends_position() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let project = svc.create(tenant, req(None, PageType::Project, "Launch")).await.unwrap();
        let a = svc
            .create(tenant, req(Some(project.page_id), PageType::Feature, "A"))
            .await
            .unwrap();
        let b = svc
            .create(tenant, req(Some(project.page_id), PageType::Document, "B"))
            .await
            .unwrap();
        assert_eq!(project.position, 0);
        assert_eq!((a.position, b.position), (0, 1));

        let second_root = svc.create(tenant, req(None, PageType::Roadmap, "Q3")).await.unwrap();
        assert_eq!(second_root.position, 1);
    }

    #[tokio::test]
    async fn test_nesting_rules_enforced() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let err = svc.create(tenant, req(None, PageType::Note, "loose")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::TreeConflict);

        let release = svc.create(tenant, req(None, PageType::Release, "v1")).await.unwrap();
        let err = svc
            .create(tenant, req(Some(release.page_id), PageType::Feature, "nope"))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TreeConflict);
    }

    #[tokio::test]
    async fn test_parent_in_other_tenant_is_404() {
        let svc = service();
        let project = svc
            .create(TenantId::now_v7(), req(None, PageType::Project, "Launch"))
            .await
            .unwrap();
        let err = svc
            .create(
                TenantId::now_v7(),
                req(Some(project.page_id), PageType::Document, "Launch plan"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityNotFound);
    }

    #[tokio::test]
    async fn test_update_merges_properties() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let mut create = req(None, PageType::Document, "Launch plan");
        create.properties = json!({"status": "draft", "owner": "ana"})
            .as_object()
            .cloned()
            .unwrap();
        let page = svc.create(tenant, create).await.unwrap();

        let patch = json!({"status": "final", "owner": null, "reviewer": "bo"})
            .as_object()
            .cloned()
            .unwrap();
        let updated = svc
            .update(
                tenant,
                page.page_id,
                UpdatePageRequest {
                    properties: Some(patch),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(
            JsonValue::Object(updated.properties),
            json!({"status": "final", "reviewer": "bo"})
        );
        assert_eq!(updated.title, "Launch plan");
    }

    #[tokio::test]
    async fn test_move_reorders_and_renumbers() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let project = svc.create(tenant, req(None, PageType::Project, "P")).await.unwrap();
        let doc = svc.create(tenant, req(None, PageType::Document, "D")).await.unwrap();
        let mut kids = Vec::new();
        for title in ["a", "b", "c"] {
            kids.push(
                svc.create(tenant, req(Some(project.page_id), PageType::Note, title))
                    .await
                    .unwrap(),
            );
        }

        // Reorder within the same parent.
        svc.move_page(
            tenant,
            kids[2].page_id,
            MovePageRequest {
                parent_id: Some(Some(project.page_id)),
                position: Some(0),
            },
        )
        .await
        .unwrap();
        let listed = svc.list_children(tenant, Some(project.page_id)).await.unwrap();
        assert_eq!(titles(&listed), vec!["c", "a", "b"]);
        assert_eq!(positions(&listed), vec![0, 1, 2]);

        // Move to another parent; old siblings close the gap.
        let moved = svc
            .move_page(
                tenant,
                kids[0].page_id,
                MovePageRequest {
                    parent_id: Some(Some(doc.page_id)),
                    position: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(doc.page_id));
        assert_eq!(moved.position, 0);
        let listed = svc.list_children(tenant, Some(project.page_id)).await.unwrap();
        assert_eq!(titles(&listed), vec!["c", "b"]);
        assert_eq!(positions(&listed), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_move_under_descendant_is_conflict() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let top = svc.create(tenant, req(None, PageType::Document, "top")).await.unwrap();
        let mid = svc
            .create(tenant, req(Some(top.page_id), PageType::Document, "mid"))
            .await
            .unwrap();
        let err = svc
            .move_page(
                tenant,
                top.page_id,
                MovePageRequest {
                    parent_id: Some(Some(mid.page_id)),
                    position: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TreeConflict);

        let err = svc
            .move_page(
                tenant,
                top.page_id,
                MovePageRequest {
                    parent_id: Some(Some(top.page_id)),
                    position: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::TreeConflict);
    }

    #[tokio::test]
    async fn test_delete_cascades_and_renumbers() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let project = svc.create(tenant, req(None, PageType::Project, "P")).await.unwrap();
        let a = svc
            .create(tenant, req(Some(project.page_id), PageType::Document, "a"))
            .await
            .unwrap();
        svc.create(tenant, req(Some(a.page_id), PageType::Note, "a1"))
            .await
            .unwrap();
        svc.create(tenant, req(Some(project.page_id), PageType::Document, "b"))
            .await
            .unwrap();

        let result = svc.delete(tenant, a.page_id).await.unwrap();
        assert_eq!(result.deleted, 2);
        assert_eq!(result.renumbered, 1);
        assert_eq!(result.detached, 0);

        let listed = svc.list_children(tenant, Some(project.page_id)).await.unwrap();
        assert_eq!(titles(&listed), vec!["b"]);
        assert_eq!(positions(&listed), vec![0]);
    }

    #[tokio::test]
    async fn test_update_never_reverts_a_concurrent_move() {
        let store = Arc::new(GatedStore::default());
        let svc = PageService::new(store.clone());
        let tenant = TenantId::now_v7();
        let a = svc.create(tenant, req(None, PageType::Document, "A")).await.unwrap();
        let b = svc
            .create(tenant, req(Some(a.page_id), PageType::Document, "B"))
            .await
            .unwrap();
        let (a_id, b_id) = (a.page_id, b.page_id);

        // The update stalls while reading B.
        store.arm(b_id.as_uuid());
        let update = tokio::spawn({
            let svc = svc.clone();
            async move {
                svc.update(
                    tenant,
                    b_id,
                    UpdatePageRequest {
                        title: Some("B2".to_string()),
                        ..Default::default()
                    },
                )
                .await
            }
        });
        store.entered.notified().await;

        // B to the top, then A under B. Writing back B's old parent would
        // close the loop A -> B -> A.
        let moves = tokio::spawn({
            let svc = svc.clone();
            async move {
                svc.move_page(
                    tenant,
                    b_id,
                    MovePageRequest {
                        parent_id: Some(None),
                        position: None,
                    },
                )
                .await?;
                svc.move_page(
                    tenant,
                    a_id,
                    MovePageRequest {
                        parent_id: Some(Some(b_id)),
                        position: None,
                    },
                )
                .await
            }
        });
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        store.release.notify_one();

        update.await.unwrap().unwrap();
        moves.await.unwrap().unwrap();

        let b_now = svc.get(tenant, b_id).await.unwrap();
        assert_eq!(b_now.parent_id, None);
        assert_eq!(b_now.title, "B2");
        let crumbs = svc.ancestors(tenant, a_id).await.unwrap();
        assert_eq!(titles(&crumbs), vec!["B2"]);
        let forest = svc.tree(tenant, None).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].node.page_id, a_id);
    }

    #[tokio::test]
    async fn test_move_without_parent_reorders_in_place() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let project = svc.create(tenant, req(None, PageType::Project, "P")).await.unwrap();
        let mut kids = Vec::new();
        for title in ["a", "b"] {
            kids.push(
                svc.create(tenant, req(Some(project.page_id), PageType::Document, title))
                    .await
                    .unwrap(),
            );
        }

        let moved = svc
            .move_page(
                tenant,
                kids[1].page_id,
                MovePageRequest {
                    parent_id: None,
                    position: Some(0),
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.parent_id, Some(project.page_id));
        assert_eq!(moved.position, 0);
        let listed = svc.list_children(tenant, Some(project.page_id)).await.unwrap();
        assert_eq!(titles(&listed), vec!["b", "a"]);

        let top = svc
            .move_page(
                tenant,
                kids[0].page_id,
                MovePageRequest {
                    parent_id: Some(None),
                    position: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(top.parent_id, None);
        assert_eq!(top.position, 1);
    }

    #[tokio::test]
    async fn test_tree_and_ancestors() {
        let svc = service();
        let tenant = TenantId::now_v7();
        let project = svc.create(tenant, req(None, PageType::Project, "P")).await.unwrap();
        let feature = svc
            .create(tenant, req(Some(project.page_id), PageType::Feature, "F"))
            .await
            .unwrap();
        let note = svc
            .create(tenant, req(Some(feature.page_id), PageType::Note, "N"))
            .await
            .unwrap();

        let forest = svc.tree(tenant, None).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children[0].children[0].node.page_id, note.page_id);

        let sub = svc.tree(tenant, Some(feature.page_id)).await.unwrap();
        assert_eq!(sub[0].node.page_id, feature.page_id);
        assert_eq!(sub[0].children.len(), 1);

        let crumbs = svc.ancestors(tenant, note.page_id).await.unwrap();
        assert_eq!(titles(&crumbs), vec!["P", "F"]);
    }
}
