use crate::config::IdentifierPolicy;
use crate::error::{IngestError, Result};
use crate::types::{ColumnList, Row, TableRef};

/// Builds every statement the tool sends to ClickHouse.
///
/// Statement shapes are fixed; names are embedded unquoted, so under
/// [`IdentifierPolicy::Validate`] they are restricted to plain identifiers.
#[derive(Debug, Clone)]
pub struct SqlGenerator {
    policy: IdentifierPolicy,
}

impl SqlGenerator {
    pub fn new(policy: IdentifierPolicy) -> Self {
        Self { policy }
    }

    pub fn show_tables(&self) -> String {
        "SHOW TABLES".to_string()
    }

    pub fn describe_table(&self, table: &TableRef) -> Result<String> {
        self.check_table(table)?;
        Ok(format!("DESCRIBE TABLE {}", table))
    }

    pub fn select_bounded(&self, table: &TableRef, columns: &ColumnList, limit: usize) -> Result<String> {
        self.check_table(table)?;
        self.check_columns(columns)?;
        Ok(format!("SELECT {} FROM {} LIMIT {}", columns.joined(), table, limit))
    }

    /// Every column is created as `String`
    pub fn create_table(&self, table: &TableRef, columns: &ColumnList) -> Result<String> {
        self.check_table(table)?;
        self.check_columns(columns)?;
        let definitions: Vec<String> = columns.iter().map(|c| format!("{} String", c)).collect();
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
            table,
            definitions.join(", ")
        ))
    }

    pub fn insert(&self, table: &TableRef, columns: &ColumnList) -> Result<InsertBatch> {
        self.check_table(table)?;
        self.check_columns(columns)?;
        Ok(InsertBatch::new(table, columns))
    }

    fn check_table(&self, table: &TableRef) -> Result<()> {
        if self.policy == IdentifierPolicy::Trusted {
            return Ok(());
        }
        let parts: Vec<&str> = table.as_str().split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_plain_identifier(p)) {
            return Err(IngestError::config(format!("invalid table name '{}'", table)));
        }
        Ok(())
    }

    fn check_columns(&self, columns: &ColumnList) -> Result<()> {
        if self.policy == IdentifierPolicy::Trusted {
            return Ok(());
        }
        match columns.iter().find(|c| !is_plain_identifier(c)) {
            Some(bad) => Err(IngestError::config(format!("invalid column name '{}'", bad))),
            None => Ok(()),
        }
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A parameterized INSERT plus the rows queued against it.
///
/// Rows are only collected here; the connection sends them in one call.
#[derive(Debug, Clone)]
pub struct InsertBatch {
    table: String,
    columns: Vec<String>,
    statement: String,
    rows: Vec<Row>,
}

impl InsertBatch {
    fn new(table: &TableRef, columns: &ColumnList) -> Self {
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.joined(),
            vec!["?"; columns.len()].join(", ")
        );
        Self {
            table: table.to_string(),
            columns: columns.as_slice().to_vec(),
            statement,
            rows: Vec::new(),
        }
    }

    /// The single-row statement: `INSERT INTO t (a, b) VALUES (?, ?)`
    pub fn statement(&self) -> &str {
        &self.statement
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Queue one row; its cell count must match the column list
    pub fn add(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(IngestError::codec(format!(
                "row has {} values but {} columns were requested",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The full statement with every queued row inlined as string literals.
    ///
    /// Built in one pass over the cells. The output holds no `?`, so the
    /// client's parameter templating leaves it untouched.
    pub fn render(&self) -> String {
        let prefix = format!("INSERT INTO {} ({}) VALUES ", self.table, self.columns.join(", "));
        let cell_bytes: usize = self.rows.iter().flatten().map(|cell| cell.len() + 4).sum();
        let mut sql = String::with_capacity(prefix.len() + cell_bytes + self.rows.len() * 4);
        sql.push_str(&prefix);

        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('(');
            for (j, cell) in row.iter().enumerate() {
                if j > 0 {
                    sql.push_str(", ");
                }
                push_string_literal(&mut sql, cell);
            }
            sql.push(')');
        }
        sql
    }
}

/// Append `value` as a single-quoted ClickHouse string literal
pub fn push_string_literal(sql: &mut String, value: &str) {
    sql.push('\'');
    for c in value.chars() {
        match c {
            '\\' => sql.push_str("\\\\"),
            '\'' => sql.push_str("\\'"),
            '\n' => sql.push_str("\\n"),
            '\r' => sql.push_str("\\r"),
            '\t' => sql.push_str("\\t"),
            '\0' => sql.push_str("\\0"),
            '?' => sql.push_str("\\x3F"),
            c => sql.push(c),
        }
    }
    sql.push('\'');
}
