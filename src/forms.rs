use crate::parser::{parse_entry_input, ParsedEntry};
use crate::tag_input::TagInput;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} name is required")]
    NameRequired(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Tags,
}

/// Name + tags form shared by the create popups and inline edits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityForm {
    pub name: String,
    pub tags: TagInput,
    pub active: FormField,
    /// Shown under the name field until the next edit.
    pub error: Option<ValidationError>,
}

impl Default for EntityForm {
    fn default() -> Self {
        EntityForm {
            name: String::new(),
            tags: TagInput::default(),
            active: FormField::Name,
            error: None,
        }
    }
}

impl EntityForm {
    pub fn with_values(name: &str, tags: &[String]) -> Self {
        EntityForm {
            name: name.to_string(),
            tags: TagInput::with_tags(tags.to_vec()),
            ..Default::default()
        }
    }

    pub fn focus(mut self, field: FormField) -> Self {
        self.active = field;
        self
    }

    pub fn next_field(&mut self) {
        self.active = match self.active {
            FormField::Name => FormField::Tags,
            FormField::Tags => FormField::Name,
        };
    }

    pub fn push_char(&mut self, c: char) {
        self.error = None;
        match self.active {
            FormField::Name => self.name.push(c),
            FormField::Tags => self.tags.push_char(c),
        }
    }

    pub fn backspace(&mut self) {
        self.error = None;
        match self.active {
            FormField::Name => {
                self.name.pop();
            }
            FormField::Tags => {
                self.tags.backspace();
            }
        }
    }

    /// Checks the name before anything is sent. `#tag` tokens in the name are
    /// split off into the returned entry.
    pub fn validate(&mut self, kind: &'static str) -> Result<ParsedEntry, ValidationError> {
        let parsed = parse_entry_input(&self.name);
        self.check(kind, parsed)
    }

    /// Edits keep the name as typed, `#` included.
    pub fn validate_verbatim(&mut self, kind: &'static str) -> Result<ParsedEntry, ValidationError> {
        let parsed = ParsedEntry {
            name: self.name.trim().to_string(),
            tags: Vec::new(),
        };
        self.check(kind, parsed)
    }

    fn check(
        &mut self,
        kind: &'static str,
        parsed: ParsedEntry,
    ) -> Result<ParsedEntry, ValidationError> {
        if parsed.name.is_empty() {
            let err = ValidationError::NameRequired(kind);
            self.error = Some(err.clone());
            return Err(err);
        }
        self.error = None;
        Ok(parsed)
    }
}
