use crate::config::Config;
use crate::debounce::Debouncer;
use crate::forms::{EntityForm, FormField};
use crate::models::{NewStaff, NewTask, RecordId, Staff, StaffPatch, Tag, Task, TaskPatch, TaskStatus};
use crate::notify::Toasts;
use crate::error::ApiResult;
use crate::services::Services;
use crate::tag_input::TagInputError;
use crate::view::{self, ListQuery, SortKey, SortSpec};
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::widgets::TableState;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot::{self, error::TryRecvError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Page {
    Tasks,
    Staff,
}

impl Page {
    pub fn title(self) -> &'static str {
        match self {
            Page::Tasks => "Tasks",
            Page::Staff => "Staff",
        }
    }

    pub fn noun(self) -> &'static str {
        match self {
            Page::Tasks => "task",
            Page::Staff => "staff member",
        }
    }

    fn kind(self) -> &'static str {
        match self {
            Page::Tasks => "Task",
            Page::Staff => "Staff",
        }
    }

    /// Sortable columns, in the order the table shows them.
    pub fn columns(self) -> &'static [SortKey] {
        match self {
            Page::Tasks => &[
                SortKey::Name,
                SortKey::Tags,
                SortKey::Owner,
                SortKey::Status,
                SortKey::CreatedOn,
                SortKey::CreatedBy,
                SortKey::ModifiedOn,
            ],
            Page::Staff => &[
                SortKey::Name,
                SortKey::Tags,
                SortKey::Owner,
                SortKey::CreatedOn,
                SortKey::CreatedBy,
                SortKey::ModifiedOn,
                SortKey::ModifiedBy,
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Search,
    Create,
    Edit(RecordId),
    Filter,
    ConfirmDelete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterRow {
    Owner,
    Creator,
    Tags,
    CreatedFrom,
    CreatedTo,
}

impl FilterRow {
    const ALL: [FilterRow; 5] = [
        FilterRow::Owner,
        FilterRow::Creator,
        FilterRow::Tags,
        FilterRow::CreatedFrom,
        FilterRow::CreatedTo,
    ];

    fn step(self, forward: bool) -> FilterRow {
        let idx = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        let n = Self::ALL.len();
        Self::ALL[if forward { (idx + 1) % n } else { (idx + n - 1) % n }]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPanel {
    pub row: FilterRow,
    pub tag_cursor: usize,
    pub from_text: String,
    pub to_text: String,
    pub error: Option<String>,
}

impl Default for FilterPanel {
    fn default() -> Self {
        FilterPanel {
            row: FilterRow::Owner,
            tag_cursor: 0,
            from_text: String::new(),
            to_text: String::new(),
            error: None,
        }
    }
}

fn cycle_choice(current: &Option<String>, choices: &[String], forward: bool) -> Option<String> {
    // slot 0 is "any"
    let n = choices.len() + 1;
    let idx = match current {
        None => 0,
        Some(c) => choices.iter().position(|x| x == c).map_or(0, |i| i + 1),
    };
    let next = if forward { (idx + 1) % n } else { (idx + n - 1) % n };
    if next == 0 {
        None
    } else {
        Some(choices[next - 1].clone())
    }
}

fn parse_day(text: &str) -> Result<Option<NaiveDate>, ()> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ())
}

/// Result of one top-level fetch.
struct Loaded {
    tasks: ApiResult<Vec<Task>>,
    staff: ApiResult<Vec<Staff>>,
    tags: Vec<Tag>,
}

async fn load_all(services: &Services) -> Loaded {
    Loaded {
        tasks: services.tasks.fetch_all().await,
        staff: services.staff.fetch_all().await,
        tags: services.tags.get_all().await,
    }
}

pub struct App {
    pub services: Arc<Services>,
    pub page: Page,
    pub tasks: Vec<Task>,
    pub staff: Vec<Staff>,
    pub tags: Vec<Tag>,
    pub task_query: ListQuery,
    pub staff_query: ListQuery,
    pub visible_tasks: Vec<Task>,
    pub visible_staff: Vec<Staff>,
    pub state: TableState,
    pub input_mode: InputMode,
    pub load_state: LoadState,
    pub needs_reload: bool,
    pending_load: Option<oneshot::Receiver<Loaded>>,
    pub search_input: String,
    search: Debouncer<String>,
    pub form: EntityForm,
    pub filter_panel: FilterPanel,
    pub marked: BTreeSet<RecordId>,
    pub pending_delete: Vec<RecordId>,
    pub toasts: Toasts,
}

impl App {
    pub fn new(services: Services, config: &Config) -> App {
        App {
            services: Arc::new(services),
            page: Page::Tasks,
            tasks: Vec::new(),
            staff: Vec::new(),
            tags: Vec::new(),
            task_query: ListQuery::new(SortSpec::tasks_default()),
            staff_query: ListQuery::new(SortSpec::staff_default()),
            visible_tasks: Vec::new(),
            visible_staff: Vec::new(),
            state: TableState::default(),
            input_mode: InputMode::Normal,
            load_state: LoadState::Loading,
            needs_reload: true,
            pending_load: None,
            search_input: String::new(),
            search: Debouncer::new(config.debounce),
            form: EntityForm::default(),
            filter_panel: FilterPanel::default(),
            marked: BTreeSet::new(),
            pending_delete: Vec::new(),
            toasts: Toasts::new(config.toast_ttl),
        }
    }

    pub fn query(&self) -> &ListQuery {
        match self.page {
            Page::Tasks => &self.task_query,
            Page::Staff => &self.staff_query,
        }
    }

    fn query_mut(&mut self) -> &mut ListQuery {
        match self.page {
            Page::Tasks => &mut self.task_query,
            Page::Staff => &mut self.staff_query,
        }
    }

    pub fn total_len(&self) -> usize {
        match self.page {
            Page::Tasks => self.tasks.len(),
            Page::Staff => self.staff.len(),
        }
    }

    pub fn visible_len(&self) -> usize {
        match self.page {
            Page::Tasks => self.visible_tasks.len(),
            Page::Staff => self.visible_staff.len(),
        }
    }

    pub fn selected_id(&self) -> Option<RecordId> {
        let idx = self.state.selected()?;
        match self.page {
            Page::Tasks => self.visible_tasks.get(idx).map(|t| t.id),
            Page::Staff => self.visible_staff.get(idx).map(|s| s.id),
        }
    }

    pub fn owner_choices(&self) -> Vec<String> {
        match self.page {
            Page::Tasks => view::distinct_owners(&self.tasks),
            Page::Staff => view::distinct_owners(&self.staff),
        }
    }

    pub fn creator_choices(&self) -> Vec<String> {
        match self.page {
            Page::Tasks => view::distinct_creators(&self.tasks),
            Page::Staff => view::distinct_creators(&self.staff),
        }
    }

    /// Re-derives both visible lists and keeps the selection in range.
    pub fn refresh_view(&mut self) {
        self.visible_tasks = view::derive(&self.tasks, &self.task_query);
        self.visible_staff = view::derive(&self.staff, &self.staff_query);

        let len = self.visible_len();
        if len == 0 {
            self.state.select(None);
        } else {
            let idx = self.state.selected().unwrap_or(0).min(len - 1);
            self.state.select(Some(idx));
        }
    }

    /// Fetches everything and waits for it.
    pub async fn reload(&mut self) {
        self.needs_reload = false;
        self.pending_load = None;
        self.load_state = LoadState::Loading;
        let loaded = load_all(&self.services).await;
        self.apply_loaded(loaded);
    }

    /// Starts a background fetch; the table shows the loading view until
    /// `tick` picks up the result. A newer request supersedes an older one.
    pub fn request_reload(&mut self) {
        self.needs_reload = false;
        self.load_state = LoadState::Loading;

        let services = Arc::clone(&self.services);
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            // receiver gone means a newer load replaced this one
            let _ = tx.send(load_all(&services).await);
        });
        self.pending_load = Some(rx);
    }

    /// Waits for an outstanding background fetch, if any.
    pub async fn wait_for_load(&mut self) {
        if let Some(rx) = self.pending_load.take() {
            match rx.await {
                Ok(loaded) => self.apply_loaded(loaded),
                Err(_) => self.load_failed("load task ended before finishing".to_string()),
            }
        }
    }

    fn apply_loaded(&mut self, loaded: Loaded) {
        self.tags = loaded.tags;
        match (loaded.tasks, loaded.staff) {
            (Ok(tasks), Ok(staff)) => {
                tracing::info!(tasks = tasks.len(), staff = staff.len(), "loaded records");
                self.tasks = tasks;
                self.staff = staff;
                self.load_state = LoadState::Ready;
            }
            (Err(err), _) | (_, Err(err)) => {
                tracing::error!(error = %err, "error loading records");
                self.load_failed(err.to_string());
            }
        }
        self.marked.clear();
        self.refresh_view();
    }

    fn load_failed(&mut self, reason: String) {
        self.load_state = LoadState::Failed(format!("Failed to load records: {}", reason));
    }

    /// Housekeeping between frames: pending loads, debounced search, toasts.
    pub fn tick(&mut self, now: Instant) {
        if self.needs_reload {
            self.request_reload();
        }
        if let Some(rx) = self.pending_load.as_mut() {
            match rx.try_recv() {
                Ok(loaded) => {
                    self.pending_load = None;
                    self.apply_loaded(loaded);
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Closed) => {
                    self.pending_load = None;
                    self.load_failed("load task ended before finishing".to_string());
                }
            }
        }
        if let Some(query) = self.search.poll(now) {
            self.apply_search(query);
        }
        self.toasts.prune(now);
    }

    fn apply_search(&mut self, query: String) {
        self.query_mut().search = query;
        self.state.select(Some(0));
        self.refresh_view();
    }

    pub fn next(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn switch_page(&mut self) {
        self.page = match self.page {
            Page::Tasks => Page::Staff,
            Page::Staff => Page::Tasks,
        };
        self.marked.clear();
        self.search.cancel();
        self.search_input = self.query().search.clone();
        self.filter_panel = FilterPanel::default();
        self.state.select(Some(0));
        self.refresh_view();
    }

    /// Column number `n` (1-based) acts like clicking that column's header.
    pub fn sort_by_column(&mut self, n: usize) {
        if let Some(key) = n.checked_sub(1).and_then(|i| self.page.columns().get(i)) {
            let key = *key;
            self.query_mut().sort.toggle(key);
            self.refresh_view();
        }
    }

    pub fn clear_all(&mut self) {
        self.search.cancel();
        self.search_input.clear();
        let query = self.query_mut();
        query.search.clear();
        query.filters.clear();
        self.filter_panel = FilterPanel::default();
        self.refresh_view();
    }

    fn toggle_mark(&mut self) {
        if let Some(id) = self.selected_id() {
            if !self.marked.remove(&id) {
                self.marked.insert(id);
            }
        }
    }

    fn request_delete(&mut self) {
        let ids: Vec<RecordId> = if self.marked.is_empty() {
            self.selected_id().into_iter().collect()
        } else {
            self.marked.iter().copied().collect()
        };
        if !ids.is_empty() {
            self.pending_delete = ids;
            self.input_mode = InputMode::ConfirmDelete;
        }
    }

    async fn confirm_delete(&mut self) {
        let ids = std::mem::take(&mut self.pending_delete);
        self.input_mode = InputMode::Normal;

        let deleted = match self.page {
            Page::Tasks => self.services.tasks.delete(&ids).await,
            Page::Staff => self.services.staff.delete(&ids).await,
        };

        if deleted {
            match self.page {
                Page::Tasks => self.tasks.retain(|t| !ids.contains(&t.id)),
                Page::Staff => self.staff.retain(|s| !ids.contains(&s.id)),
            }
            self.marked.clear();
            if ids.len() == 1 {
                self.toasts
                    .success(format!("{} deleted successfully", self.page.kind()));
            } else {
                self.toasts
                    .success(format!("{} {} records deleted", ids.len(), self.page.noun()));
            }
            self.refresh_view();
        } else {
            self.toasts
                .error(format!("Failed to delete {}", self.page.noun()));
            // some may have gone; show what is left
            self.request_reload();
        }
    }

    fn open_create(&mut self) {
        self.form = EntityForm::default();
        self.input_mode = InputMode::Create;
    }

    fn open_edit(&mut self, field: FormField) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let current = match self.page {
            Page::Tasks => self
                .tasks
                .iter()
                .find(|t| t.id == id)
                .map(|t| (t.name.clone(), t.tags.clone())),
            Page::Staff => self
                .staff
                .iter()
                .find(|s| s.id == id)
                .map(|s| (s.name.clone(), s.tags.clone())),
        };
        if let Some((name, tags)) = current {
            self.form = EntityForm::with_values(&name, &tags).focus(field);
            self.input_mode = InputMode::Edit(id);
        }
    }

    fn close_form(&mut self) {
        self.form = EntityForm::default();
        self.input_mode = InputMode::Normal;
    }

    async fn commit_tag(&mut self) -> bool {
        match self
            .form
            .tags
            .commit(&self.services.tags, &mut self.tags)
            .await
        {
            Ok(_) => true,
            Err(TagInputError::CreateFailed(name)) => {
                self.toasts.error(format!("Failed to create tag {}", name));
                false
            }
            // blank or already chosen: nothing to add
            Err(_) => {
                self.form.tags.buffer.clear();
                true
            }
        }
    }

    async fn submit_form(&mut self) {
        // quick-add only applies to new records
        let parsed = match self.input_mode {
            InputMode::Create => self.form.validate(self.page.kind()),
            _ => self.form.validate_verbatim(self.page.kind()),
        };
        let Ok(parsed) = parsed else {
            return;
        };

        if !self.form.tags.buffer.trim().is_empty() && !self.commit_tag().await {
            return;
        }
        for tag in &parsed.tags {
            match self
                .form
                .tags
                .add(tag, &self.services.tags, &mut self.tags)
                .await
            {
                Ok(_) | Err(TagInputError::Duplicate(_)) | Err(TagInputError::Blank) => {}
                Err(err) => {
                    self.toasts.error(err.to_string());
                    return;
                }
            }
        }

        let tags = self.form.tags.selected.clone();
        match self.input_mode {
            InputMode::Create => self.create_entity(parsed.name, tags).await,
            InputMode::Edit(id) => self.update_entity(id, parsed.name, tags).await,
            _ => {}
        }
        self.refresh_view();
    }

    async fn create_entity(&mut self, name: String, tags: Vec<String>) {
        let created = match self.page {
            Page::Tasks => {
                let draft = NewTask {
                    name,
                    tags,
                    status: TaskStatus::Active,
                };
                match self.services.tasks.create(&draft).await {
                    Some(task) => {
                        self.tasks.insert(0, task);
                        true
                    }
                    None => false,
                }
            }
            Page::Staff => {
                let draft = NewStaff { name, tags };
                match self.services.staff.create(&draft).await {
                    Some(member) => {
                        self.staff.insert(0, member);
                        true
                    }
                    None => false,
                }
            }
        };

        if created {
            self.toasts
                .success(format!("{} created successfully", self.page.kind()));
            self.close_form();
        } else {
            self.toasts.error(format!(
                "Failed to create {}. Please try again.",
                self.page.noun()
            ));
        }
    }

    async fn update_entity(&mut self, id: RecordId, name: String, tags: Vec<String>) {
        let updated = match self.page {
            Page::Tasks => {
                let Some(current) = self.tasks.iter().find(|t| t.id == id) else {
                    self.close_form();
                    return;
                };
                let patch = TaskPatch {
                    tags: (current.tags != tags).then_some(tags),
                    name: (current.name != name).then_some(name),
                    status: None,
                };
                if patch == TaskPatch::default() {
                    self.close_form();
                    return;
                }
                match self.services.tasks.update(id, &patch).await {
                    Some(task) => {
                        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == id) {
                            *slot = task;
                        }
                        true
                    }
                    None => false,
                }
            }
            Page::Staff => {
                let Some(current) = self.staff.iter().find(|s| s.id == id) else {
                    self.close_form();
                    return;
                };
                let patch = StaffPatch {
                    tags: (current.tags != tags).then_some(tags),
                    name: (current.name != name).then_some(name),
                };
                if patch == StaffPatch::default() {
                    self.close_form();
                    return;
                }
                match self.services.staff.update(id, &patch).await {
                    Some(member) => {
                        if let Some(slot) = self.staff.iter_mut().find(|s| s.id == id) {
                            *slot = member;
                        }
                        true
                    }
                    None => false,
                }
            }
        };

        if updated {
            self.toasts
                .success(format!("{} updated successfully", self.page.kind()));
            self.close_form();
        } else {
            self.toasts
                .error(format!("Failed to update {}", self.page.noun()));
        }
    }

    fn edit_date(&mut self, from: bool, key: KeyCode) {
        let text = if from {
            &mut self.filter_panel.from_text
        } else {
            &mut self.filter_panel.to_text
        };
        match key {
            KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => text.push(c),
            KeyCode::Backspace => {
                text.pop();
            }
            _ => return,
        }

        let parsed = parse_day(text);
        let day = match parsed {
            Ok(day) => {
                self.filter_panel.error = None;
                day
            }
            Err(()) => {
                self.filter_panel.error = Some("Dates use YYYY-MM-DD".to_string());
                None
            }
        };
        let filters = &mut self.query_mut().filters;
        if from {
            filters.created_from = day;
        } else {
            filters.created_to = day;
        }
        self.refresh_view();
    }

    fn handle_filter_key(&mut self, key: KeyCode) {
        let row = self.filter_panel.row;
        match key {
            KeyCode::Esc | KeyCode::Char('f') => self.input_mode = InputMode::Normal,
            KeyCode::Down | KeyCode::Char('j') => self.filter_panel.row = row.step(true),
            KeyCode::Up | KeyCode::Char('k') => self.filter_panel.row = row.step(false),
            KeyCode::Char('x') => {
                self.query_mut().filters.clear();
                self.filter_panel = FilterPanel {
                    row,
                    ..Default::default()
                };
                self.refresh_view();
            }
            KeyCode::Left | KeyCode::Right | KeyCode::Char('h') | KeyCode::Char('l') => {
                let forward = matches!(key, KeyCode::Right | KeyCode::Char('l'));
                match row {
                    FilterRow::Owner => {
                        let choices = self.owner_choices();
                        let filters = &mut self.query_mut().filters;
                        filters.owner = cycle_choice(&filters.owner, &choices, forward);
                        self.refresh_view();
                    }
                    FilterRow::Creator => {
                        let choices = self.creator_choices();
                        let filters = &mut self.query_mut().filters;
                        filters.created_by = cycle_choice(&filters.created_by, &choices, forward);
                        self.refresh_view();
                    }
                    FilterRow::Tags if !self.tags.is_empty() => {
                        let n = self.tags.len();
                        let cursor = self.filter_panel.tag_cursor.min(n - 1);
                        self.filter_panel.tag_cursor = if forward {
                            (cursor + 1) % n
                        } else {
                            (cursor + n - 1) % n
                        };
                    }
                    _ => {}
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter if row == FilterRow::Tags => {
                if let Some(tag) = self.tags.get(self.filter_panel.tag_cursor) {
                    let name = tag.name.clone();
                    self.query_mut().filters.toggle_tag(&name);
                    self.refresh_view();
                }
            }
            KeyCode::Char(_) | KeyCode::Backspace
                if matches!(row, FilterRow::CreatedFrom | FilterRow::CreatedTo) =>
            {
                self.edit_date(row == FilterRow::CreatedFrom, key);
            }
            _ => {}
        }
    }

    async fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.close_form(),
            KeyCode::Tab | KeyCode::BackTab => self.form.next_field(),
            KeyCode::Enter => {
                if self.form.active == FormField::Tags && !self.form.tags.buffer.trim().is_empty()
                {
                    self.commit_tag().await;
                } else {
                    self.submit_form().await;
                }
            }
            KeyCode::Up if self.form.active == FormField::Tags => self.form.tags.previous_color(),
            KeyCode::Down if self.form.active == FormField::Tags => self.form.tags.next_color(),
            KeyCode::Backspace => self.form.backspace(),
            KeyCode::Char(c) => self.form.push_char(c),
            _ => {}
        }
    }

    /// Returns true when the user asked to quit.
    pub async fn handle_input(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        match self.input_mode {
            InputMode::Normal => match key.code {
                KeyCode::Char('q') => return true,
                KeyCode::Char('j') | KeyCode::Down => self.next(),
                KeyCode::Char('k') | KeyCode::Up => self.previous(),
                KeyCode::Tab => self.switch_page(),
                KeyCode::Char('/') => {
                    self.search_input = self.query().search.clone();
                    self.input_mode = InputMode::Search;
                }
                KeyCode::Char('a') => self.open_create(),
                KeyCode::Char('e') | KeyCode::Enter => self.open_edit(FormField::Name),
                KeyCode::Char('t') => self.open_edit(FormField::Tags),
                KeyCode::Char('f') => self.input_mode = InputMode::Filter,
                KeyCode::Char(' ') => self.toggle_mark(),
                KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
                KeyCode::Char('c') => self.clear_all(),
                KeyCode::Char('r') => {
                    self.request_reload();
                    self.toasts
                        .info(format!("Refreshing {} list", self.page.noun()));
                }
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    self.sort_by_column(c.to_digit(10).unwrap_or(0) as usize);
                }
                KeyCode::Esc => self.marked.clear(),
                _ => {}
            },

            InputMode::Search => match key.code {
                KeyCode::Enter => {
                    if let Some(query) = self.search.flush() {
                        self.apply_search(query);
                    }
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Esc => {
                    self.search.cancel();
                    self.search_input.clear();
                    self.apply_search(String::new());
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Char(c) => {
                    self.search_input.push(c);
                    self.search.schedule(self.search_input.clone(), Instant::now());
                }
                KeyCode::Backspace => {
                    self.search_input.pop();
                    self.search.schedule(self.search_input.clone(), Instant::now());
                }
                _ => {}
            },

            InputMode::Create | InputMode::Edit(_) => self.handle_form_key(key).await,

            InputMode::Filter => self.handle_filter_key(key.code),

            InputMode::ConfirmDelete => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => self.confirm_delete().await,
                KeyCode::Char('n') | KeyCode::Esc => {
                    self.pending_delete.clear();
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        false
    }
}
