use crate::models::{same_name, NewTag, Tag};
use crate::services::tag::find_by_name;
use crate::services::TagService;

/// Colours offered for newly created tags.
pub const PALETTE: [&str; 10] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#06b6d4", "#84cc16", "#f97316",
    "#ec4899", "#6366f1",
];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TagInputError {
    #[error("tag name is empty")]
    Blank,
    #[error("tag `{0}` is already added")]
    Duplicate(String),
    #[error("could not create tag `{0}`")]
    CreateFailed(String),
}

/// Tag entry for a form: the chosen names, the text being typed and the
/// colour a new tag will get.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagInput {
    pub selected: Vec<String>,
    pub buffer: String,
    color_idx: usize,
}

impl TagInput {
    pub fn with_tags(tags: Vec<String>) -> Self {
        TagInput {
            selected: tags,
            ..Default::default()
        }
    }

    pub fn color(&self) -> &'static str {
        PALETTE[self.color_idx % PALETTE.len()]
    }

    pub fn next_color(&mut self) {
        self.color_idx = (self.color_idx + 1) % PALETTE.len();
    }

    pub fn previous_color(&mut self) {
        self.color_idx = (self.color_idx + PALETTE.len() - 1) % PALETTE.len();
    }

    pub fn push_char(&mut self, c: char) {
        self.buffer.push(c);
    }

    /// Backspace: edits the buffer, or drops the last tag once it is empty.
    pub fn backspace(&mut self) -> Option<String> {
        if self.buffer.pop().is_some() {
            None
        } else {
            self.selected.pop()
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.selected.retain(|t| t != name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.selected.iter().any(|t| same_name(t, name))
    }

    /// Known tags whose names contain the buffer and are not yet selected.
    pub fn suggestions<'a>(&self, known: &'a [Tag]) -> Vec<&'a Tag> {
        let needle = self.buffer.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        known
            .iter()
            .filter(|t| t.name.to_lowercase().contains(&needle) && !self.contains(&t.name))
            .collect()
    }

    fn check(&self, raw: &str) -> Result<String, TagInputError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(TagInputError::Blank);
        }
        if self.contains(name) {
            return Err(TagInputError::Duplicate(name.to_string()));
        }
        Ok(name.to_string())
    }

    /// Commits the buffer. The buffer is kept when the tag is rejected.
    pub async fn commit(
        &mut self,
        service: &TagService,
        known: &mut Vec<Tag>,
    ) -> Result<String, TagInputError> {
        let raw = self.buffer.clone();
        let name = self.add(&raw, service, known).await?;
        self.buffer.clear();
        Ok(name)
    }

    /// Lookup-or-create `raw` and append the canonical name to the selection.
    /// A newly created tag is also appended to `known`.
    pub async fn add(
        &mut self,
        raw: &str,
        service: &TagService,
        known: &mut Vec<Tag>,
    ) -> Result<String, TagInputError> {
        let name = self.check(raw)?;

        let canonical = match find_by_name(known, &name) {
            Some(tag) => tag.name.clone(),
            None => {
                let draft = NewTag {
                    name: name.clone(),
                    color: self.color().to_string(),
                };
                let tag = service
                    .create(&draft)
                    .await
                    .ok_or_else(|| TagInputError::CreateFailed(name.clone()))?;
                let canonical = tag.name.clone();
                if find_by_name(known, &canonical).is_none() {
                    known.push(tag);
                }
                canonical
            }
        };

        self.selected.push(canonical.clone());
        Ok(canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{fixture_store, identity};
    use crate::services::EntityService;

    async fn setup() -> (TagService, Vec<Tag>) {
        let service = TagService::new(EntityService::new(
            fixture_store().await,
            "tag_c",
            identity(),
            100,
        ));
        let known = service.get_all().await;
        (service, known)
    }

    #[tokio::test]
    async fn test_commit_uses_existing_canonical_name() {
        let (service, mut known) = setup().await;
        let mut input = TagInput::default();
        input.buffer = "  Finance ".to_string();

        let name = input.commit(&service, &mut known).await.unwrap();

        assert_eq!(name, "finance");
        assert_eq!(input.selected, vec!["finance"]);
        assert!(input.buffer.is_empty());
        assert_eq!(known.len(), 6);
    }

    #[test]
    fn test_duplicate_check_folds_non_ascii_case() {
        let mut input = TagInput::with_tags(vec!["Éclair".to_string()]);
        assert!(input.contains("éclair"));

        input.buffer = "ÉCLAIR".to_string();
        assert_eq!(
            input.check(&input.buffer.clone()),
            Err(TagInputError::Duplicate("ÉCLAIR".to_string()))
        );
    }

    #[tokio::test]
    async fn test_commit_creates_missing_tag_with_selected_color() {
        let (service, mut known) = setup().await;
        let mut input = TagInput::default();
        input.next_color();
        input.buffer = "Blocked".to_string();

        input.commit(&service, &mut known).await.unwrap();

        let created = find_by_name(&known, "blocked").unwrap();
        assert_eq!(created.color, "#10b981");
        assert_eq!(service.get_all().await.len(), 7);
    }

    #[tokio::test]
    async fn test_commit_rejects_blank_and_duplicates() {
        let (service, mut known) = setup().await;
        let mut input = TagInput::with_tags(vec!["ops".to_string()]);

        input.buffer = "   ".to_string();
        assert_eq!(
            input.commit(&service, &mut known).await,
            Err(TagInputError::Blank)
        );

        input.buffer = "OPS".to_string();
        assert_eq!(
            input.commit(&service, &mut known).await,
            Err(TagInputError::Duplicate("OPS".to_string()))
        );
        assert_eq!(input.buffer, "OPS");
        assert_eq!(input.selected, vec!["ops"]);
    }

    #[test]
    fn test_backspace_removes_last_tag_when_buffer_empty() {
        let mut input = TagInput::with_tags(vec!["a".to_string(), "b".to_string()]);
        input.push_char('x');

        assert_eq!(input.backspace(), None);
        assert_eq!(input.backspace(), Some("b".to_string()));
        assert_eq!(input.selected, vec!["a"]);
    }

    #[test]
    fn test_suggestions_skip_selected() {
        let known = vec![
            Tag {
                id: 1,
                name: "backend".to_string(),
                color: PALETTE[0].to_string(),
            },
            Tag {
                id: 2,
                name: "backlog".to_string(),
                color: PALETTE[1].to_string(),
            },
        ];
        let mut input = TagInput::with_tags(vec!["backlog".to_string()]);
        input.buffer = "BACK".to_string();

        let names: Vec<_> = input.suggestions(&known).iter().map(|t| t.id).collect();
        assert_eq!(names, vec![1]);
    }

    #[test]
    fn test_palette_wraps() {
        let mut input = TagInput::default();
        input.previous_color();
        assert_eq!(input.color(), "#6366f1");
        input.next_color();
        assert_eq!(input.color(), "#3b82f6");
    }
}
