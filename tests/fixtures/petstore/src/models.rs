use serde::{Deserialize, Serialize};

/// Fields stamped on every stored record.
#[derive(Serialize, Deserialize)]
pub struct Audit {
    pub created_at: String,
    /// Storage key of the record
    pub id: String,
}

/// A pet in the store.
#[derive(Serialize, Deserialize)]
pub struct Pet {
    pub id: i64,
    /// @example Rex
    pub name: String,
    pub tag: Option<String>,
    #[serde(flatten)]
    pub audit: Audit,
}

/// One page of results.
#[derive(Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Available,
    Sold,
}
