//! Search, filter and sort over an already-fetched list.
//!
//! [`derive`] is re-run whenever the query, the filters, the sort or the data
//! change. It clones what it keeps and never touches its input.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{join_tags, same_name, Staff, Task};

/// Columns a list can be sorted by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Tags,
    Owner,
    Status,
    CreatedOn,
    CreatedBy,
    ModifiedOn,
    ModifiedBy,
}

impl SortKey {
    pub fn label(self) -> &'static str {
        match self {
            SortKey::Name => "Name",
            SortKey::Tags => "Tags",
            SortKey::Owner => "Owner",
            SortKey::Status => "Status",
            SortKey::CreatedOn => "Created",
            SortKey::CreatedBy => "Created by",
            SortKey::ModifiedOn => "Modified",
            SortKey::ModifiedBy => "Modified by",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: Direction,
}

impl SortSpec {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        SortSpec { key, direction }
    }

    pub fn tasks_default() -> Self {
        SortSpec::new(SortKey::CreatedOn, Direction::Descending)
    }

    pub fn staff_default() -> Self {
        SortSpec::new(SortKey::ModifiedOn, Direction::Descending)
    }

    /// Picking the current key while ascending flips to descending; any other
    /// pick sorts ascending by the picked key.
    pub fn toggle(&mut self, key: SortKey) {
        self.direction = if self.key == key && self.direction == Direction::Ascending {
            Direction::Descending
        } else {
            Direction::Ascending
        };
        self.key = key;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub owner: Option<String>,
    pub created_by: Option<String>,
    /// A record passes if it carries any one of these.
    pub tags: Vec<String>,
    pub created_from: Option<NaiveDate>,
    /// Inclusive: the whole day counts.
    pub created_to: Option<NaiveDate>,
}

impl FilterCriteria {
    pub fn is_active(&self) -> bool {
        self.owner.is_some()
            || self.created_by.is_some()
            || !self.tags.is_empty()
            || self.created_from.is_some()
            || self.created_to.is_some()
    }

    pub fn clear(&mut self) {
        *self = FilterCriteria::default();
    }

    pub fn toggle_tag(&mut self, name: &str) {
        if let Some(pos) = self.tags.iter().position(|t| same_name(t, name)) {
            self.tags.remove(pos);
        } else {
            self.tags.push(name.to_string());
        }
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| same_name(t, name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListQuery {
    pub search: String,
    pub filters: FilterCriteria,
    pub sort: SortSpec,
}

impl ListQuery {
    pub fn new(sort: SortSpec) -> Self {
        ListQuery {
            search: String::new(),
            filters: FilterCriteria::default(),
            sort,
        }
    }

    pub fn is_narrowed(&self) -> bool {
        !self.search.trim().is_empty() || self.filters.is_active()
    }
}

/// What the view-model needs to know about a row.
pub trait Listable: Clone {
    fn name(&self) -> &str;
    fn tags(&self) -> &[String];
    fn owner_name(&self) -> Option<&str>;
    fn creator_name(&self) -> Option<&str>;
    fn modifier_name(&self) -> Option<&str>;
    fn created_on(&self) -> Option<DateTime<Utc>>;
    fn modified_on(&self) -> Option<DateTime<Utc>>;

    fn status(&self) -> Option<String> {
        None
    }

    /// Extra fields searched besides name, tags and owner. `query` is lowercase.
    fn matches_extra(&self, _query: &str) -> bool {
        false
    }
}

impl Listable for Task {
    fn name(&self) -> &str {
        &self.name
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|l| l.name.as_str())
    }
    fn creator_name(&self) -> Option<&str> {
        self.created_by.as_ref().map(|l| l.name.as_str())
    }
    fn modifier_name(&self) -> Option<&str> {
        self.modified_by.as_ref().map(|l| l.name.as_str())
    }
    fn created_on(&self) -> Option<DateTime<Utc>> {
        self.created_on
    }
    fn modified_on(&self) -> Option<DateTime<Utc>> {
        self.modified_on
    }
    fn status(&self) -> Option<String> {
        Some(self.status.to_string())
    }
}

impl Listable for Staff {
    fn name(&self) -> &str {
        &self.name
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|l| l.name.as_str())
    }
    fn creator_name(&self) -> Option<&str> {
        self.created_by.as_ref().map(|l| l.name.as_str())
    }
    fn modifier_name(&self) -> Option<&str> {
        self.modified_by.as_ref().map(|l| l.name.as_str())
    }
    fn created_on(&self) -> Option<DateTime<Utc>> {
        self.created_on
    }
    fn modified_on(&self) -> Option<DateTime<Utc>> {
        self.modified_on
    }

    // staff search also covers who added the record
    fn matches_extra(&self, query: &str) -> bool {
        self.creator_name()
            .is_some_and(|n| n.to_lowercase().contains(query))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Text(String),
    Time(Option<DateTime<Utc>>),
}

fn lookup_text(name: Option<&str>) -> SortValue {
    SortValue::Text(name.unwrap_or_default().to_lowercase())
}

fn sort_value<E: Listable>(item: &E, key: SortKey) -> SortValue {
    match key {
        SortKey::Name => SortValue::Text(item.name().to_lowercase()),
        SortKey::Tags => SortValue::Text(join_tags(item.tags()).to_lowercase()),
        SortKey::Owner => lookup_text(item.owner_name()),
        SortKey::CreatedBy => lookup_text(item.creator_name()),
        SortKey::ModifiedBy => lookup_text(item.modifier_name()),
        SortKey::Status => SortValue::Text(item.status().unwrap_or_default().to_lowercase()),
        SortKey::CreatedOn => SortValue::Time(item.created_on()),
        SortKey::ModifiedOn => SortValue::Time(item.modified_on()),
    }
}

pub fn compare<E: Listable>(a: &E, b: &E, sort: SortSpec) -> Ordering {
    let ord = sort_value(a, sort.key).cmp(&sort_value(b, sort.key));
    match sort.direction {
        Direction::Ascending => ord,
        Direction::Descending => ord.reverse(),
    }
}

/// `query` must already be lowercase and non-empty.
fn matches_search<E: Listable>(item: &E, query: &str) -> bool {
    item.name().to_lowercase().contains(query)
        || join_tags(item.tags()).to_lowercase().contains(query)
        || item
            .owner_name()
            .is_some_and(|n| n.to_lowercase().contains(query))
        || item.matches_extra(query)
}

fn matches_filters<E: Listable>(item: &E, filters: &FilterCriteria) -> bool {
    if let Some(owner) = &filters.owner {
        if item.owner_name() != Some(owner.as_str()) {
            return false;
        }
    }
    if let Some(creator) = &filters.created_by {
        if item.creator_name() != Some(creator.as_str()) {
            return false;
        }
    }
    if !filters.tags.is_empty()
        && !filters
            .tags
            .iter()
            .any(|wanted| item.tags().iter().any(|t| same_name(t, wanted)))
    {
        return false;
    }

    let created = item.created_on().map(|d| d.date_naive());
    if let Some(from) = filters.created_from {
        if !created.is_some_and(|d| d >= from) {
            return false;
        }
    }
    if let Some(to) = filters.created_to {
        if !created.is_some_and(|d| d <= to) {
            return false;
        }
    }
    true
}

pub fn derive<E: Listable>(items: &[E], query: &ListQuery) -> Vec<E> {
    let needle = query.search.trim().to_lowercase();
    let mut out: Vec<E> = items
        .iter()
        .filter(|item| needle.is_empty() || matches_search(*item, &needle))
        .filter(|item| matches_filters(*item, &query.filters))
        .cloned()
        .collect();

    // sort_by is stable, ties keep their fetched order
    out.sort_by(|a, b| compare(a, b, query.sort));
    out
}

pub fn distinct_owners<E: Listable>(items: &[E]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.owner_name())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tag names in use across `items`, first spelling wins.
pub fn distinct_tags<E: Listable>(items: &[E]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for tag in items.iter().flat_map(|i| i.tags()) {
        if !seen.iter().any(|t| same_name(t, tag)) {
            seen.push(tag.clone());
        }
    }
    seen
}

pub fn distinct_creators<E: Listable>(items: &[E]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.creator_name())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
