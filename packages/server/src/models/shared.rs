use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::user;

/// Pagination metadata included in list responses.
#[derive(Serialize, ToSchema)]
pub struct Pagination {
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    /// Number of items per page.
    #[schema(example = 10)]
    pub per_page: u64,
    /// Total number of matching items across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Total number of pages.
    #[schema(example = 5)]
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, per_page: u64, total: u64) -> Self {
        Self {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}

pub const MIN_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 30;

/// Owner filter and page window shared by the list endpoints.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Only list entities owned by this user.
    pub user_id: i32,
    /// 1-based page number.
    pub page: Option<u64>,
    /// Items per page, clamped to 10-30.
    #[serde(alias = "itemPerPage")]
    pub per_page: Option<u64>,
}

impl ListQuery {
    /// `(page, per_page)` after clamping.
    pub fn window(&self) -> (u64, u64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(MIN_PER_PAGE)
            .clamp(MIN_PER_PAGE, MAX_PER_PAGE);
        (page, per_page)
    }
}

/// Public view of an owner.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SingerSummary {
    pub id: i32,
    pub username: String,
    pub fullname: String,
    pub email: String,
}

impl From<user::Model> for SingerSummary {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            fullname: m.fullname,
            email: m.email,
        }
    }
}
