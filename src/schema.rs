//! Canonical shipment schema, column types, and header resolution.
//!
//! This module owns the [`Schema`] struct (the ordered, immutable set of
//! columns every sanitized dataset must expose), the [`ColumnType`] enum
//! (the storage types the table is created with), and the [`Coercion`] rule
//! attached to each column.
//!
//! ## Responsibilities
//!
//! - Building the 14-column shipment schema ([`Schema::shipments`])
//! - Mapping column types to SQL storage types for table creation
//! - Resolving a dataset's headers against the schema, including the
//!   single-missing-column rename heuristic

use std::{collections::HashSet, fmt};

use itertools::Itertools;
use thiserror::Error;

pub const RECORD: &str = "Record";
pub const INVOICE: &str = "Invoice";
pub const SHIP_DATE: &str = "ShipDate";
pub const ACCOUNT: &str = "Account";
pub const CUSTOMER: &str = "Customer";
pub const ITEM: &str = "Item";
pub const PRODUCT: &str = "Product";
pub const DESCRIPTION: &str = "Description";
pub const ORDERED: &str = "Ordered";
pub const SHIPPED: &str = "Shipped";
pub const UNIT_PRICE: &str = "UnitPrice";
pub const UNIT_COST: &str = "UnitCost";
pub const EXT_PRICE: &str = "ExtPrice";
pub const EXT_COST: &str = "ExtCost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    BoundedString(usize),
    Date,
    SmallInt,
    Money,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::BoundedString(_) => "varchar",
            ColumnType::Date => "date",
            ColumnType::SmallInt => "smallint",
            ColumnType::Money => "money",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnType::BoundedString(len) => format!("varchar({len})"),
            _ => self.as_str().to_string(),
        }
    }

    /// Storage type used when the target table is created.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::BoundedString(len) => format!("VARCHAR({len})"),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Money => "FLOAT".to_string(),
        }
    }

    pub fn max_len(&self) -> Option<usize> {
        match self {
            ColumnType::BoundedString(len) => Some(*len),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// How raw cells are normalized before they are typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Free text, trimmed only.
    Text,
    /// Identifier text; any fractional artifact after the first `.` is dropped.
    Identifier,
    /// Signed quantity with thousands separators and accounting parentheses.
    Quantity,
    /// Currency amount rounded to two decimal places.
    Money,
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: &'static str,
    pub datatype: ColumnType,
    pub coercion: Coercion,
    pub description: &'static str,
}

impl ColumnMeta {
    const fn new(
        name: &'static str,
        datatype: ColumnType,
        coercion: Coercion,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            datatype,
            coercion,
            description,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("dataset is missing columns {}", format_names(.missing))]
    MissingColumns { missing: Vec<String> },
    #[error(
        "dataset is missing column [{missing}] and it cannot be resolved by rename (unrecognized columns: {})",
        format_names(.candidates)
    )]
    UnresolvedColumn {
        missing: String,
        candidates: Vec<String>,
    },
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.iter().map(|name| format!("[{name}]")).join(", ")
    }
}

/// Outcome of checking a dataset's headers against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderResolution {
    Complete,
    /// Only the business key is absent and it will be derived later.
    KeyDeferred,
    /// The single unrecognized column stands in for the single missing one.
    Rename { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnMeta>,
    business_key: &'static str,
}

impl Schema {
    /// The fixed 14-column shipment layout, in storage order.
    pub fn shipments() -> Self {
        use Coercion as C;
        use ColumnType as T;
        let columns = vec![
            ColumnMeta::new(RECORD, T::Text, C::Text, "Account.Invoice.Item"),
            ColumnMeta::new(INVOICE, T::Text, C::Identifier, "Invoice number"),
            ColumnMeta::new(SHIP_DATE, T::Date, C::Date, "Invoice date"),
            ColumnMeta::new(ACCOUNT, T::BoundedString(16), C::Identifier, "Store number"),
            ColumnMeta::new(
                CUSTOMER,
                T::BoundedString(32),
                C::Identifier,
                "Distributor account number",
            ),
            ColumnMeta::new(
                ITEM,
                T::BoundedString(32),
                C::Identifier,
                "Distributor item number",
            ),
            ColumnMeta::new(
                PRODUCT,
                T::BoundedString(32),
                C::Identifier,
                "Brand item number",
            ),
            ColumnMeta::new(DESCRIPTION, T::Text, C::Text, "Brand item description"),
            ColumnMeta::new(ORDERED, T::SmallInt, C::Quantity, "Quantity ordered"),
            ColumnMeta::new(SHIPPED, T::SmallInt, C::Quantity, "Quantity shipped"),
            ColumnMeta::new(UNIT_PRICE, T::Money, C::Money, "Unit price to operator"),
            ColumnMeta::new(UNIT_COST, T::Money, C::Money, "Unit cost to distributor"),
            ColumnMeta::new(EXT_PRICE, T::Money, C::Money, "Total price to operator"),
            ColumnMeta::new(EXT_COST, T::Money, C::Money, "Total cost to distributor"),
        ];
        Self {
            columns,
            business_key: RECORD,
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn business_key(&self) -> &'static str {
        self.business_key
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    /// Checks `headers` against the schema.
    ///
    /// Extra columns are tolerated. A single missing column is accepted when
    /// it is the business key and `require_business_key` is false, or when
    /// exactly one header is unrecognized, in which case that header is
    /// reported as a rename. Anything else is ambiguous and rejected.
    pub fn resolve_headers(
        &self,
        headers: &[String],
        require_business_key: bool,
    ) -> Result<HeaderResolution, SchemaError> {
        let present: HashSet<&str> = headers.iter().map(String::as_str).collect();
        let missing = self
            .columns
            .iter()
            .filter(|column| !present.contains(column.name))
            .map(|column| column.name.to_string())
            .collect::<Vec<_>>();

        match missing.as_slice() {
            [] => Ok(HeaderResolution::Complete),
            [only] if only == self.business_key && !require_business_key => {
                Ok(HeaderResolution::KeyDeferred)
            }
            [only] => {
                let candidates = headers
                    .iter()
                    .filter(|header| !self.contains(header))
                    .cloned()
                    .collect::<Vec<_>>();
                match candidates.as_slice() {
                    [from] => Ok(HeaderResolution::Rename {
                        from: from.clone(),
                        to: only.clone(),
                    }),
                    _ => Err(SchemaError::UnresolvedColumn {
                        missing: only.clone(),
                        candidates,
                    }),
                }
            }
            _ => Err(SchemaError::MissingColumns { missing }),
        }
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::shipments()
    }
}
