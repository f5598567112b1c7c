//! Canonical column set and types
//!
//! Single source of truth for the 15-column cleaned schema, the columns that
//! are derived from the nested `purchase_history` blob, and the narrow Arrow
//! type each recognized column is coerced to.

use arrow::datatypes::DataType;

/// Nested purchase blob column present in raw-shaped input files
pub const PURCHASE_HISTORY: &str = "purchase_history";

/// Default cleaned column set, in output order
pub const TARGET_COLUMNS: [&str; 15] = [
    "id",
    "last_login",
    "user_name",
    "fullname",
    "age",
    "income",
    "gender",
    "country",
    "is_active",
    "purchase_avg_price",
    "purchase_categories",
    "purchase_item_ids",
    "payment_method",
    "payment_status",
    "purchase_date",
];

/// Identity fields hashed into a record fingerprint, in hashing order
pub const IDENTITY_COLUMNS: [&str; 3] = ["id", "last_login", "user_name"];

/// Default columns that must be non-null for a record to survive
pub const MANDATORY_COLUMNS: [&str; 5] = ["id", "last_login", "user_name", "age", "income"];

/// Default numeric columns screened with the IQR rule
pub const OUTLIER_COLUMNS: [&str; 3] = ["age", "income", "purchase_avg_price"];

/// Blob key → flattened column name
pub const PURCHASE_RENAMES: [(&str, &str); 6] = [
    ("avg_price", "purchase_avg_price"),
    ("categories", "purchase_categories"),
    ("items", "purchase_item_ids"),
    ("payment_method", "payment_method"),
    ("payment_status", "payment_status"),
    ("purchase_date", "purchase_date"),
];

/// Returns true if the column is produced by expanding `purchase_history`
pub fn is_purchase_derived(column: &str) -> bool {
    PURCHASE_RENAMES.iter().any(|(_, flat)| *flat == column)
}

/// Dictionary-encoded string type used for bounded categoricals
pub fn categorical() -> DataType {
    DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
}

/// Canonical type for a recognized column, `None` for free-form columns.
pub fn canonical_type(column: &str) -> Option<DataType> {
    match column {
        "id" => Some(DataType::UInt32),
        "age" => Some(DataType::UInt8),
        "income" | "purchase_avg_price" => Some(DataType::Float32),
        "gender" | "country" | "purchase_categories" | "payment_method" | "payment_status"
        | "item_category" => Some(categorical()),
        "is_active" => Some(DataType::Boolean),
        _ => None,
    }
}

/// Owned copy of a static column list.
pub fn owned(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
