//! The books library tool agent.
//!
//! Read-only access to the catalog behind [`store::BookStore`]: listing
//! books, picking the most recent one, fetching chapters and validating
//! author names. Result sets are capped by the `max_rows` config key.

pub mod store;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

use self::store::BookStore;
use subquest_core::names::stage;
use subquest_core::{Agent, AgentResult, ExecutionContext};

/// Default cap on returned rows.
pub const DEFAULT_MAX_ROWS: usize = 1000;

/// Tables `dynamic_query` may touch unless the config narrows them.
pub const DEFAULT_ALLOWED_TABLES: [&str; 3] = ["authors", "books", "chapters"];

pub struct BooksLibraryAgent {
    store: Arc<dyn BookStore>,
    max_rows: usize,
    allowed_tables: Vec<String>,
}

impl BooksLibraryAgent {
    pub fn new(store: Arc<dyn BookStore>, max_rows: usize) -> Self {
        Self {
            store,
            max_rows,
            allowed_tables: DEFAULT_ALLOWED_TABLES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Narrow the table whitelist for `dynamic_query`.
    pub fn with_allowed_tables(mut self, tables: Vec<String>) -> Self {
        self.allowed_tables = tables;
        self
    }

    fn list_books(&self, params: &Value) -> AgentResult {
        let Some(author) = params["author"].as_str() else {
            return AgentResult::error("'author' must be a string", stage::DATA_FETCH);
        };
        let mut books = self.store.books_by_author(author);
        books.sort_by_key(|b| b.year);
        let truncated = books.len() > self.max_rows;
        books.truncate(self.max_rows);

        debug!(author, count = books.len(), "listed books");
        let count = books.len();
        let mut result = AgentResult::ok(
            stage::DATA_FETCH,
            serde_json::to_value(&books).unwrap_or(Value::Null),
        )
        .with_summary(format!("found {count} book(s) by '{author}'"));
        if truncated {
            result = result.with_metadata("truncated_to", json!(self.max_rows));
        }
        result
    }

    fn get_last_book(&self, params: &Value) -> AgentResult {
        let Some(author) = params["author"].as_str() else {
            return AgentResult::error("'author' must be a string", stage::DATA_FETCH);
        };
        let books = self.store.books_by_author(author);
        match books.into_iter().max_by_key(|b| b.year) {
            Some(book) => AgentResult::ok(
                stage::DATA_FETCH,
                serde_json::to_value(&book).unwrap_or(Value::Null),
            )
            .with_summary(format!("latest book by '{author}': {}", book.title)),
            None => AgentResult::error(
                format!("no books found for author '{author}'"),
                stage::DATA_FETCH,
            ),
        }
    }

    fn get_book_chapters(&self, params: &Value) -> AgentResult {
        let Some(title) = params["title"].as_str() else {
            return AgentResult::error("'title' must be a string", stage::DATA_FETCH);
        };
        match self.store.chapters(title) {
            Some(chapters) => {
                let count = chapters.len();
                AgentResult::ok(stage::DATA_FETCH, json!(chapters))
                    .with_summary(format!("'{title}' has {count} chapter(s)"))
            }
            None => AgentResult::error(format!("book '{title}' not found"), stage::DATA_FETCH),
        }
    }

    fn dynamic_query(&self, params: &Value) -> AgentResult {
        let Some(table) = params["table"].as_str() else {
            return AgentResult::error("'table' must be a string", stage::DATA_FETCH);
        };
        if !self.allowed_tables.iter().any(|t| t == table) {
            return AgentResult::error(
                format!("table '{table}' is not in the allowed list"),
                stage::DATA_FETCH,
            );
        }
        let Some(rows) = self.store.table_rows(table) else {
            return AgentResult::error(format!("table '{table}' not found"), stage::DATA_FETCH);
        };

        // Equality filters only; string comparison is case-insensitive.
        let filters = params
            .get("filters")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let mut rows: Vec<Value> = rows
            .into_iter()
            .filter(|row| {
                filters.iter().all(|(field, expected)| {
                    match (row.get(field), expected) {
                        (Some(Value::String(actual)), Value::String(expected)) => {
                            actual.eq_ignore_ascii_case(expected)
                        }
                        (Some(actual), expected) => actual == expected,
                        (None, _) => false,
                    }
                })
            })
            .collect();

        let limit = params
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(self.max_rows)
            .min(self.max_rows);
        let truncated = rows.len() > limit;
        rows.truncate(limit);

        let count = rows.len();
        debug!(table, count, "dynamic query");
        let mut result = AgentResult::ok(stage::DATA_FETCH, Value::Array(rows))
            .with_summary(format!("{count} row(s) from '{table}'"));
        if truncated {
            result = result.with_metadata("truncated_to", json!(limit));
        }
        result
    }

    fn validate_author(&self, params: &Value) -> AgentResult {
        let candidates: Vec<String> = match params.get("candidates") {
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => {
                return AgentResult::error(
                    "'candidates' must be an array of strings",
                    stage::ENTITY_VALIDATION,
                );
            }
        };
        let matches = self.store.match_authors(&candidates);
        let count = matches.len();
        AgentResult::ok(
            stage::ENTITY_VALIDATION,
            json!({"authors": matches}),
        )
        .with_summary(format!("matched {count} author(s)"))
    }
}

#[async_trait]
impl Agent for BooksLibraryAgent {
    fn name(&self) -> &str {
        "BooksLibraryAgent"
    }

    async fn execute_operation(
        &self,
        operation: &str,
        params: Value,
        _context: &ExecutionContext,
    ) -> AgentResult {
        match operation {
            "list_books" => self.list_books(&params),
            "get_last_book" => self.get_last_book(&params),
            "get_book_chapters" => self.get_book_chapters(&params),
            "dynamic_query" => self.dynamic_query(&params),
            "validate_author" => self.validate_author(&params),
            other => AgentResult::error(
                format!("unknown operation '{other}'"),
                stage::DATA_FETCH,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::store::InMemoryBookStore;
    use super::*;

    fn agent() -> BooksLibraryAgent {
        BooksLibraryAgent::new(Arc::new(InMemoryBookStore::sample_library()), DEFAULT_MAX_ROWS)
    }

    #[tokio::test]
    async fn list_books_sorted_by_year() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation("list_books", json!({"author": "Pushkin"}), &ctx)
            .await;
        assert!(result.is_ok());
        let books = result.output.unwrap();
        assert_eq!(books.as_array().unwrap().len(), 4);
        assert_eq!(books[0]["title"], "Ruslan and Ludmila");
        assert_eq!(books[3]["title"], "The Captain's Daughter");
    }

    #[tokio::test]
    async fn max_rows_caps_the_result() {
        let small = BooksLibraryAgent::new(Arc::new(InMemoryBookStore::sample_library()), 2);
        let ctx = ExecutionContext::new("q");
        let result = small
            .execute_operation("list_books", json!({"author": "Pushkin"}), &ctx)
            .await;
        assert_eq!(result.output.as_ref().unwrap().as_array().unwrap().len(), 2);
        assert_eq!(result.metadata["truncated_to"], json!(2));
    }

    #[tokio::test]
    async fn get_last_book_picks_latest_year() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation("get_last_book", json!({"author": "Pushkin"}), &ctx)
            .await;
        assert_eq!(result.output.unwrap()["title"], "The Captain's Daughter");
    }

    #[tokio::test]
    async fn unknown_author_is_an_error_for_last_book() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation("get_last_book", json!({"author": "Chekhov"}), &ctx)
            .await;
        assert!(result.is_error());
    }

    #[tokio::test]
    async fn chapters_and_missing_book() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation("get_book_chapters", json!({"title": "Eugene Onegin"}), &ctx)
            .await;
        assert_eq!(result.output.unwrap().as_array().unwrap().len(), 8);

        let missing = agent()
            .execute_operation("get_book_chapters", json!({"title": "Nope"}), &ctx)
            .await;
        assert!(missing.is_error());
    }

    #[tokio::test]
    async fn validate_author_returns_canonical_names() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation(
                "validate_author",
                json!({"candidates": ["pushkin"]}),
                &ctx,
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(result.stage.as_deref(), Some("entity_validation"));
        assert_eq!(
            result.output.unwrap()["authors"][0]["name"],
            "Alexander Pushkin"
        );
    }

    #[tokio::test]
    async fn dynamic_query_filters_and_respects_the_whitelist() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation(
                "dynamic_query",
                json!({"table": "books", "filters": {"author": "alexander pushkin"}}),
                &ctx,
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(result.output.unwrap().as_array().unwrap().len(), 4);

        let denied = agent()
            .execute_operation("dynamic_query", json!({"table": "secrets"}), &ctx)
            .await;
        assert!(denied.is_error());
        assert!(denied.error.unwrap().contains("allowed"));

        let narrowed = BooksLibraryAgent::new(
            Arc::new(InMemoryBookStore::sample_library()),
            DEFAULT_MAX_ROWS,
        )
        .with_allowed_tables(vec!["books".to_string()]);
        let denied = narrowed
            .execute_operation("dynamic_query", json!({"table": "authors"}), &ctx)
            .await;
        assert!(denied.is_error());
    }

    #[tokio::test]
    async fn dynamic_query_limit_is_capped_by_max_rows() {
        let small = BooksLibraryAgent::new(Arc::new(InMemoryBookStore::sample_library()), 3);
        let ctx = ExecutionContext::new("q");
        let result = small
            .execute_operation("dynamic_query", json!({"table": "books", "limit": 100}), &ctx)
            .await;
        let rows = result.output.as_ref().unwrap().as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(result.metadata["truncated_to"], json!(3));
    }

    #[tokio::test]
    async fn bad_param_types_are_errors() {
        let ctx = ExecutionContext::new("q");
        let result = agent()
            .execute_operation("list_books", json!({"author": 42}), &ctx)
            .await;
        assert!(result.is_error());

        let result = agent()
            .execute_operation("validate_author", json!({"candidates": 42}), &ctx)
            .await;
        assert!(result.is_error());
    }
}
