//! The data seam of the books library agent.
//!
//! The real deployment sits on a SQL database; that stays outside this
//! workspace. [`BookStore`] is the interface the agent programs against,
//! and [`InMemoryBookStore`] is the bundled implementation used by the CLI
//! demo and the tests.

use serde::{Deserialize, Serialize};

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub year: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
}

/// An author-name match produced by entity validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorMatch {
    /// Canonical name as stored in the catalog.
    pub name: String,
    /// The candidate string that matched it.
    pub matched_from: String,
}

/// Read-only access to the books catalog.
pub trait BookStore: Send + Sync {
    /// Books by an author, case-insensitive match on the author name.
    fn books_by_author(&self, author: &str) -> Vec<Book>;

    /// Chapter titles of a book, `None` when the title is unknown.
    fn chapters(&self, title: &str) -> Option<Vec<String>>;

    /// Canonical author names matching any of the candidate strings.
    fn match_authors(&self, candidates: &[String]) -> Vec<AuthorMatch>;

    /// All rows of a named table as flat JSON objects, `None` when the
    /// table does not exist. Backs the `dynamic_query` operation; which
    /// tables a caller may touch is enforced by the agent, not the store.
    fn table_rows(&self, table: &str) -> Option<Vec<serde_json::Value>>;
}

/// In-memory catalog with a small sample library.
#[derive(Debug, Default)]
pub struct InMemoryBookStore {
    books: Vec<Book>,
    chapters: Vec<(String, Vec<String>)>,
}

impl InMemoryBookStore {
    pub fn new(books: Vec<Book>) -> Self {
        Self {
            books,
            chapters: Vec::new(),
        }
    }

    /// Attach chapters for a title.
    pub fn with_chapters(mut self, title: impl Into<String>, chapters: Vec<&str>) -> Self {
        self.chapters
            .push((title.into(), chapters.into_iter().map(String::from).collect()));
        self
    }

    /// The sample library used by the demo and the tests.
    pub fn sample_library() -> Self {
        let book = |title: &str, author: &str, year: i32, genre: &str| Book {
            title: title.to_string(),
            author: author.to_string(),
            year,
            genre: Some(genre.to_string()),
        };
        Self::new(vec![
            book("Ruslan and Ludmila", "Alexander Pushkin", 1820, "poem"),
            book("Boris Godunov", "Alexander Pushkin", 1825, "drama"),
            book("Eugene Onegin", "Alexander Pushkin", 1833, "novel in verse"),
            book("The Captain's Daughter", "Alexander Pushkin", 1836, "novel"),
            book("Dead Souls", "Nikolai Gogol", 1842, "novel"),
            book("The Overcoat", "Nikolai Gogol", 1842, "short story"),
            book("War and Peace", "Leo Tolstoy", 1869, "novel"),
            book("Anna Karenina", "Leo Tolstoy", 1878, "novel"),
        ])
        .with_chapters(
            "Eugene Onegin",
            vec![
                "Chapter One", "Chapter Two", "Chapter Three", "Chapter Four",
                "Chapter Five", "Chapter Six", "Chapter Seven", "Chapter Eight",
            ],
        )
    }
}

impl BookStore for InMemoryBookStore {
    fn books_by_author(&self, author: &str) -> Vec<Book> {
        let needle = author.to_lowercase();
        self.books
            .iter()
            .filter(|b| {
                let name = b.author.to_lowercase();
                name == needle || name.contains(&needle)
            })
            .cloned()
            .collect()
    }

    fn chapters(&self, title: &str) -> Option<Vec<String>> {
        let needle = title.to_lowercase();
        self.chapters
            .iter()
            .find(|(t, _)| t.to_lowercase() == needle)
            .map(|(_, chapters)| chapters.clone())
    }

    fn table_rows(&self, table: &str) -> Option<Vec<serde_json::Value>> {
        use serde_json::json;
        match table {
            "books" => Some(
                self.books
                    .iter()
                    .map(|b| serde_json::to_value(b).unwrap_or_default())
                    .collect(),
            ),
            "authors" => {
                let mut names: Vec<&str> =
                    self.books.iter().map(|b| b.author.as_str()).collect();
                names.sort();
                names.dedup();
                Some(
                    names
                        .into_iter()
                        .map(|name| {
                            let count =
                                self.books.iter().filter(|b| b.author == name).count();
                            json!({"name": name, "books": count})
                        })
                        .collect(),
                )
            }
            "chapters" => Some(
                self.chapters
                    .iter()
                    .flat_map(|(title, chapters)| {
                        chapters.iter().map(move |chapter| {
                            json!({"book_title": title, "chapter": chapter})
                        })
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    fn match_authors(&self, candidates: &[String]) -> Vec<AuthorMatch> {
        let mut matches = Vec::new();
        for candidate in candidates {
            let needle = candidate.to_lowercase();
            if needle.is_empty() {
                continue;
            }
            for book in &self.books {
                let name = book.author.to_lowercase();
                if (name.contains(&needle) || needle.contains(&name))
                    && !matches
                        .iter()
                        .any(|m: &AuthorMatch| m.name == book.author)
                {
                    matches.push(AuthorMatch {
                        name: book.author.clone(),
                        matched_from: candidate.clone(),
                    });
                }
            }
        }
        matches
    }
}
