//! Query Builder pagination operations

use super::builder::QuerySpecification;
use crate::error::{ModelError, ModelResult};

impl QuerySpecification {
    /// Set the page size, optionally jumping to a 1-based `page`.
    ///
    /// With a page the offset becomes `max(0, page - 1) * count`; without one
    /// the current offset is kept as is. An offset beyond `u64` is a
    /// validation error and leaves the specification unchanged.
    pub fn limit(&mut self, count: u64, page: Option<u64>) -> ModelResult<&mut Self> {
        if let Some(max) = self.limit_max {
            if count > max {
                return Err(ModelError::LimitExceeded { limit: count, max });
            }
        }

        let offset = match page {
            Some(page) => Some(page.saturating_sub(1).checked_mul(count).ok_or_else(|| {
                ModelError::Validation(format!("Page {} of size {} is out of range", page, count))
            })?),
            None => None,
        };

        self.limit_count = Some(count);
        if offset.is_some() {
            self.offset_value = offset;
        }
        Ok(self)
    }

    /// Add OFFSET clause; only rendered with a limit
    pub fn offset(&mut self, count: u64) -> &mut Self {
        self.offset_value = Some(count);
        self
    }

    /// Remove LIMIT and OFFSET
    pub fn clear_limit(&mut self) -> &mut Self {
        self.limit_count = None;
        self.offset_value = None;
        self
    }

    /// 1-based page derived from the current limit and offset
    pub fn current_page(&self) -> Option<u64> {
        let limit = self.limit_count.filter(|limit| *limit > 0)?;
        Some(self.offset_value.unwrap_or(0) / limit + 1)
    }
}
