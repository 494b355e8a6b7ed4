/// How table and column names are checked before they are embedded in SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Plain identifiers only; tables may be qualified as `database.table`
    Validate,
    /// Embed names exactly as given (trusted input)
    Trusted,
}

/// Settings shared by the transfer and preview engines
#[derive(Debug, Clone)]
pub struct TransferSettings {
    /// Maximum data rows returned by a table preview
    pub preview_limit: usize,
    /// Maximum rows written by an export
    pub export_limit: usize,
    /// Records shown by a local file preview
    pub file_preview_rows: usize,
    pub identifier_policy: IdentifierPolicy,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            preview_limit: 100,
            export_limit: 10_000,
            file_preview_rows: 5,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }
}

impl TransferSettings {
    pub fn trusted(mut self) -> Self {
        self.identifier_policy = IdentifierPolicy::Trusted;
        self
    }
}
