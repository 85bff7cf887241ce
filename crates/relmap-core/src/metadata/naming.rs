//! Naming strategy used to derive table, column and join names.
//!
//! A strategy is consulted only when a declaration leaves a name out.
//! Explicit names are never rewritten.

use regex::Regex;
use std::sync::OnceLock;

/// Derives physical names from entity and property names.
pub trait NamingStrategy: Send + Sync + std::fmt::Debug {
    /// Table name for an entity without an explicit table name.
    fn table_name(&self, entity: &str) -> String;

    /// Column name for a property without an explicit column name.
    fn column_name(&self, property: &str) -> String;

    /// Join column for an owning to-one relation.
    ///
    /// `referenced_column` is the column name of the referenced primary key
    /// on the target table.
    fn join_column_name(&self, relation: &str, referenced_column: &str) -> String;

    /// Join table for the owning side of a many-to-many relation.
    fn join_table_name(&self, owner_table: &str, property: &str, target_table: &str) -> String;
}

/// CamelCase to snake_case naming.
///
/// | input                          | output                  |
/// |--------------------------------|-------------------------|
/// | entity `BlogPost`              | table `blog_post`       |
/// | property `createdAt`           | column `created_at`     |
/// | relation `author`, column `id` | join column `author_id` |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNamingStrategy;

impl NamingStrategy for DefaultNamingStrategy {
    fn table_name(&self, entity: &str) -> String {
        snake_case(entity)
    }

    fn column_name(&self, property: &str) -> String {
        snake_case(property)
    }

    fn join_column_name(&self, relation: &str, referenced_column: &str) -> String {
        format!("{}_{}", snake_case(relation), referenced_column)
    }

    fn join_table_name(&self, owner_table: &str, property: &str, target_table: &str) -> String {
        format!("{}_{}_{}", owner_table, snake_case(property), target_table)
    }
}

struct CasePatterns {
    /// `aB` and `1B` boundaries
    lower_upper: Regex,
    /// `ABc` boundaries inside acronyms (`HTTPServer` -> `HTTP_Server`)
    acronym: Regex,
}

fn case_patterns() -> Option<&'static CasePatterns> {
    static PATTERNS: OnceLock<Option<CasePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let lower_upper = Regex::new(r"([a-z0-9])([A-Z])");
            let acronym = Regex::new(r"([A-Z]+)([A-Z][a-z])");
            match (lower_upper, acronym) {
                (Ok(lower_upper), Ok(acronym)) => Some(CasePatterns {
                    lower_upper,
                    acronym,
                }),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "Case conversion patterns failed to compile");
                    None
                }
            }
        })
        .as_ref()
}

/// Convert a CamelCase or camelCase identifier to snake_case.
///
/// Identifiers that are already snake_case pass through unchanged.
pub fn snake_case(name: &str) -> String {
    let Some(patterns) = case_patterns() else {
        return name.to_lowercase();
    };
    let spaced = patterns.acronym.replace_all(name, "${1}_${2}");
    let spaced = patterns.lower_upper.replace_all(&spaced, "${1}_${2}");
    spaced.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("Post"), "post");
        assert_eq!(snake_case("BlogPost"), "blog_post");
        assert_eq!(snake_case("postId"), "post_id");
        assert_eq!(snake_case("HTTPServer"), "http_server");
        assert_eq!(snake_case("already_snake"), "already_snake");
        assert_eq!(snake_case("version2Name"), "version2_name");
    }

    #[test]
    fn test_default_strategy() {
        let naming = DefaultNamingStrategy;
        assert_eq!(naming.table_name("UserProfile"), "user_profile");
        assert_eq!(naming.column_name("createdAt"), "created_at");
        assert_eq!(naming.join_column_name("author", "id"), "author_id");
        assert_eq!(naming.join_column_name("parentCategory", "id"), "parent_category_id");
        assert_eq!(naming.join_table_name("post", "tags", "tag"), "post_tags_tag");
    }
}
