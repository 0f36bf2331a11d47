//! The three statement shapes the demo script issues.

pub fn create_table(table: &str) -> String {
    format!("CREATE TABLE {table} (id INTEGER, content);")
}

pub fn insert_row(table: &str, id: i64, content: &str) -> String {
    format!("INSERT INTO {table} VALUES ({id}, {});", quote_text(content))
}

pub fn select_all(table: &str) -> String {
    format!("SELECT * FROM {table}")
}

/// Single-quoted SQL text literal.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
