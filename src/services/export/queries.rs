use chrono::{DateTime, Utc};

use crate::store::SavedQuery;

/// Render a single saved query as a commented .sql document.
pub fn render_query(query: &SavedQuery) -> String {
    format!(
        "-- Query: {}\n-- Created: {}\n\n{}\n",
        query.name,
        format_timestamp(query.timestamp),
        query.query
    )
}

/// Render every saved query into one .sql document, separated by rules.
pub fn render_all_queries(queries: &[SavedQuery]) -> String {
    let separator = format!("\n{}\n\n", "=".repeat(80));
    queries
        .iter()
        .map(render_query)
        .collect::<Vec<_>>()
        .join(&separator)
}

pub fn query_export_filename(name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.sql", slug)
}

pub fn all_queries_export_filename(date: chrono::NaiveDate) -> String {
    format!("all_saved_queries_{}.sql", date.format("%Y-%m-%d"))
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(name: &str, sql: &str) -> SavedQuery {
        SavedQuery {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            query: sql.to_string(),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn single_query_has_name_and_created_header() {
        let rendered = render_query(&saved("Top users", "SELECT * FROM users"));
        assert!(rendered.starts_with("-- Query: Top users\n-- Created: 2023-11-14"));
        assert!(rendered.ends_with("SELECT * FROM users\n"));
    }

    #[test]
    fn all_queries_are_separated_by_a_rule() {
        let rendered = render_all_queries(&[saved("a", "SELECT 1"), saved("b", "SELECT 2")]);
        let rule = "=".repeat(80);
        assert_eq!(rendered.matches(&rule).count(), 1);
        assert!(rendered.contains("-- Query: a"));
        assert!(rendered.contains("-- Query: b"));
    }

    #[test]
    fn filenames_are_sanitized_lowercase() {
        assert_eq!(query_export_filename("Top Users (2024)!"), "top_users__2024__.sql");
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(
            all_queries_export_filename(date),
            "all_saved_queries_2025-03-07.sql"
        );
    }
}
