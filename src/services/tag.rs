use tokio::sync::Mutex;

use super::{Entity, EntityService};
use crate::error::ApiResult;
use crate::models::{same_name, NewTag, RecordId, Tag, TagPatch, DEFAULT_TAG_COLOR};

impl Entity for Tag {
    type Draft = NewTag;
    type Patch = TagPatch;

    const KIND: &'static str = "tag";
    const FIELDS: &'static [&'static str] = &["Id", "Name", "color_c"];

    fn id(&self) -> RecordId {
        self.id
    }
}

/// Case-insensitive name match.
pub fn find_by_name<'a>(tags: &'a [Tag], name: &str) -> Option<&'a Tag> {
    tags.iter().find(|t| same_name(&t.name, name))
}

pub fn color_of<'a>(tags: &'a [Tag], name: &str) -> &'a str {
    find_by_name(tags, name)
        .map(|t| t.color.as_str())
        .unwrap_or(DEFAULT_TAG_COLOR)
}

/// Tag service. Creation is lookup-or-create and is serialised within this
/// process; two processes can still race on the same new name.
pub struct TagService {
    inner: EntityService<Tag>,
    create_lock: Mutex<()>,
}

impl TagService {
    pub fn new(inner: EntityService<Tag>) -> Self {
        TagService {
            inner,
            create_lock: Mutex::new(()),
        }
    }

    pub async fn fetch_all(&self) -> ApiResult<Vec<Tag>> {
        self.inner.fetch_all().await
    }

    pub async fn get_all(&self) -> Vec<Tag> {
        self.inner.get_all().await
    }

    pub async fn get_by_id(&self, id: RecordId) -> Option<Tag> {
        self.inner.get_by_id(id).await
    }

    /// Walks every page of the tag table, stopping at the first match.
    async fn find_existing(&self, name: &str) -> ApiResult<Option<Tag>> {
        let page_size = self.inner.page_size();
        let mut offset = 0;
        loop {
            let (page, fetched) = self.inner.fetch_page(offset).await?;
            if let Some(tag) = find_by_name(&page, name) {
                return Ok(Some(tag.clone()));
            }
            if page_size == 0 || fetched < page_size as usize {
                return Ok(None);
            }
            offset += page_size;
        }
    }

    /// Returns the existing tag when one matches the name case-insensitively.
    pub async fn try_create(&self, draft: &NewTag) -> ApiResult<Tag> {
        let _guard = self.create_lock.lock().await;

        if let Some(tag) = self.find_existing(&draft.name).await? {
            tracing::debug!(name = %tag.name, id = tag.id, "tag already exists");
            return Ok(tag);
        }

        let draft = NewTag {
            name: draft.name.trim().to_string(),
            color: draft.color.clone(),
        };
        self.inner.try_create(&draft).await
    }

    pub async fn create(&self, draft: &NewTag) -> Option<Tag> {
        match self.try_create(draft).await {
            Ok(tag) => Some(tag),
            Err(err) => {
                tracing::error!(name = %draft.name, error = %err, "error creating tag");
                None
            }
        }
    }

    pub async fn update(&self, id: RecordId, patch: &TagPatch) -> Option<Tag> {
        self.inner.update(id, patch).await
    }

    pub async fn delete(&self, ids: &[RecordId]) -> bool {
        self.inner.delete(ids).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::services::testing::{fixture_store, identity};

    async fn service() -> TagService {
        TagService::new(EntityService::new(
            fixture_store().await,
            "tag_c",
            identity(),
            100,
        ))
    }

    fn draft(name: &str) -> NewTag {
        NewTag {
            name: name.to_string(),
            color: "#84cc16".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent_by_case_insensitive_name() {
        let tags = service().await;

        let first = tags.create(&draft("Release")).await.unwrap();
        let second = tags.create(&draft("release")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.name, "Release");
        let all = tags.get_all().await;
        assert_eq!(all.iter().filter(|t| same_name(&t.name, "release")).count(), 1);
    }

    #[tokio::test]
    async fn test_create_returns_seeded_tag() {
        let tags = service().await;
        let urgent = tags.create(&draft("  URGENT ")).await.unwrap();
        assert_eq!(urgent.id, 1);
        assert_eq!(urgent.color, "#ef4444");
    }

    #[tokio::test]
    async fn test_concurrent_creates_in_process_are_deduplicated() {
        let tags = Arc::new(service().await);

        let a = tokio::spawn({
            let tags = tags.clone();
            async move { tags.create(&draft("Blocked")).await }
        });
        let b = tokio::spawn({
            let tags = tags.clone();
            async move { tags.create(&draft("BLOCKED")).await }
        });

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_lookup_finds_tags_beyond_first_page() {
        let tags = service().await;
        for i in 0..100 {
            tags.create(&draft(&format!("t{}", i))).await.unwrap();
        }

        let first = tags.create(&draft("t99")).await.unwrap();
        let second = tags.create(&draft("T99")).await.unwrap();

        assert_eq!(first.id, 106);
        assert_eq!(second.id, 106);
        assert_eq!(tags.get_all().await.len(), 100);
        let (_, fetched) = tags.inner.fetch_page(100).await.unwrap();
        assert_eq!(fetched, 6);
    }

    #[tokio::test]
    async fn test_lookup_walks_small_pages() {
        let tags = TagService::new(EntityService::new(
            fixture_store().await,
            "tag_c",
            identity(),
            4,
        ));

        // "lead" is the sixth seeded tag, on the second page
        let lead = tags.create(&draft("Lead")).await.unwrap();
        assert_eq!(lead.id, 6);
        assert_eq!(lead.name, "lead");
    }

    #[test]
    fn test_find_by_name_folds_unicode_case() {
        let tags = vec![Tag {
            id: 3,
            name: "Éclair".to_string(),
            color: "#f59e0b".to_string(),
        }];
        assert_eq!(find_by_name(&tags, " éCLAIR ").map(|t| t.id), Some(3));
    }

    #[test]
    fn test_color_of_falls_back_to_default() {
        let tags = vec![Tag {
            id: 1,
            name: "ops".to_string(),
            color: "#f59e0b".to_string(),
        }];
        assert_eq!(color_of(&tags, "OPS"), "#f59e0b");
        assert_eq!(color_of(&tags, "missing"), DEFAULT_TAG_COLOR);
    }
}
