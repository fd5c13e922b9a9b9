//! SQL text builders
//!
//! Every identifier is double-quoted; placeholders follow the backend
//! (`$1, $2, ...` for Postgres, `?` for SQLite). Column lists are passed in
//! by the caller and written in the order given.

use crate::types::Backend;

/// Double-quote an identifier
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Placeholder for the `n`th (1-based) bound parameter
pub fn placeholder(backend: Backend, n: usize) -> String {
    match backend {
        Backend::Postgres => format!("${n}"),
        Backend::Sqlite => "?".to_string(),
    }
}

fn column_list(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `INSERT INTO "t" ("a", "b") VALUES ($1, $2)`
pub fn insert(backend: Backend, table: &str, columns: &[&str]) -> String {
    let values = (1..=columns.len())
        .map(|n| placeholder(backend, n))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({values})",
        quote(table),
        column_list(columns)
    )
}

/// `SELECT "a", "b" FROM "t" WHERE <filter>`
pub fn select(table: &str, columns: &[&str], filter: Option<&str>) -> String {
    let mut sql = format!("SELECT {} FROM {}", column_list(columns), quote(table));
    if let Some(filter) = filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql
}

/// `SELECT ... ORDER BY "key"`
pub fn select_ordered(table: &str, columns: &[&str], order_by: &str) -> String {
    format!("{} ORDER BY {}", select(table, columns, None), quote(order_by))
}

/// `UPDATE "t" SET "a" = $1, "b" = $2 WHERE "id" = $3`
pub fn update(backend: Backend, table: &str, set: &[&str], key: &str) -> String {
    let assignments = set
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote(c), placeholder(backend, i + 1)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {assignments} WHERE {}",
        quote(table),
        eq(backend, key, set.len() + 1)
    )
}

/// `DELETE FROM "t" WHERE <filter>`
pub fn delete(table: &str, filter: &str) -> String {
    format!("DELETE FROM {} WHERE {filter}", quote(table))
}

/// `"column" = $n`
pub fn eq(backend: Backend, column: &str, n: usize) -> String {
    format!("{} = {}", quote(column), placeholder(backend, n))
}

/// `"column" IN (SELECT "key" FROM "t" WHERE <filter>)`
pub fn in_subquery(column: &str, table: &str, key: &str, filter: &str) -> String {
    format!(
        "{} IN ({})",
        quote(column),
        select(table, &[key], Some(filter))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_placeholders() {
        assert_eq!(
            insert(Backend::Postgres, "lists", &["id", "name"]),
            r#"INSERT INTO "lists" ("id", "name") VALUES ($1, $2)"#
        );
        assert_eq!(
            insert(Backend::Sqlite, "lists", &["id", "name"]),
            r#"INSERT INTO "lists" ("id", "name") VALUES (?, ?)"#
        );
    }

    #[test]
    fn test_update_key_follows_set_list() {
        assert_eq!(
            update(Backend::Postgres, "lists", &["name", "updated_at"], "id"),
            r#"UPDATE "lists" SET "name" = $1, "updated_at" = $2 WHERE "id" = $3"#
        );
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote(r#"we"ird"#), r#""we""ird""#);
    }

    #[test]
    fn test_nested_scope() {
        let inner = eq(Backend::Postgres, "list_id", 1);
        assert_eq!(
            in_subquery("item_id", "item", "id", &inner),
            r#""item_id" IN (SELECT "id" FROM "item" WHERE "list_id" = $1)"#
        );
    }
}
