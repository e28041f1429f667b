//! Common types used across the platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Soft-delete state of a catalog entity.
///
/// Rows are never physically removed once created; a deletion moves the
/// entity into `Deleted` and records who did it and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    Deleted {
        at: DateTime<Utc>,
        by: Option<i64>,
    },
}

impl Lifecycle {
    /// Rebuild the state from the nullable `deleted_at` / `deleted_by` columns
    pub fn from_columns(deleted_at: Option<DateTime<Utc>>, deleted_by: Option<i64>) -> Self {
        match deleted_at {
            Some(at) => Lifecycle::Deleted { at, by: deleted_by },
            None => Lifecycle::Active,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Lifecycle::Deleted { .. })
    }

    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Lifecycle::Deleted { at, .. } => Some(*at),
            Lifecycle::Active => None,
        }
    }

    pub fn deleted_by(&self) -> Option<i64> {
        match self {
            Lifecycle::Deleted { by, .. } => *by,
            Lifecycle::Active => None,
        }
    }
}

/// Which rows a lookup may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Active flag set and not soft-deleted. Used for every foreign key check.
    Active,
    /// Not soft-deleted, regardless of the active flag
    NotDeleted,
    /// Everything, including soft-deleted rows
    Any,
}

/// Entities carrying an active flag and a soft-delete state
pub trait SoftDelete {
    fn lifecycle(&self) -> &Lifecycle;

    fn is_active(&self) -> bool;

    fn visible(&self, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Active => self.is_active() && !self.lifecycle().is_deleted(),
            Visibility::NotDeleted => !self.lifecycle().is_deleted(),
            Visibility::Any => true,
        }
    }
}

/// Sort direction for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse a user supplied direction, falling back to descending
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Resolved pagination parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    /// Clamp raw query values: page is at least 1, limit is within 1..=max_limit
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_items: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(total_items: u64, request: &PageRequest) -> Self {
        let limit = u64::from(request.limit.max(1));
        let total_pages = total_items.div_ceil(limit);
        Self {
            total_items,
            page: request.page,
            limit: request.limit,
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        }
    }
}

/// Paginated listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    /// Cut one page out of an already filtered and sorted result set
    pub fn from_sorted(all: Vec<T>, request: &PageRequest) -> Self {
        let pagination = PaginationMeta::new(all.len() as u64, request);
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let items = all
            .into_iter()
            .skip(offset)
            .take(request.limit as usize)
            .collect();
        Self { items, pagination }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}
