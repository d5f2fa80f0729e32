// rest_api/src/handlers/mod.rs

pub mod auth;
pub mod dashboard;
pub mod drives;
pub mod reports;
pub mod students;

use lib::Page;

/// Folds the optional `page`/`limit` query parameters into a `Page`.
pub(crate) fn page_from(page: Option<u64>, limit: Option<u64>) -> Page {
    Page::new(page.unwrap_or(1), limit.unwrap_or(10))
}
