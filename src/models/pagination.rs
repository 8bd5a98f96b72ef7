//! Page/per_page resolution shared by every listing

use serde::Serialize;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    /// Validate requested paging; `per_page` is capped at the configured maximum.
    pub fn resolve(page: Option<i64>, per_page: Option<i64>, config: &PaginationConfig) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(config.default_per_page);
        if page < 1 || per_page < 1 {
            return Err(AppError::BadRequest(
                "Page and per_page parameters must be positive integers".to_string(),
            ));
        }
        let per_page = per_page.min(config.max_per_page);
        if (page - 1).checked_mul(per_page).is_none() {
            return Err(AppError::BadRequest(format!("Page {} is out of range", page)));
        }
        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        (total + self.per_page - 1) / self.per_page
    }
}
