use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult, SkuId};

/// SKU code as typed or scanned by warehouse staff.
///
/// Display keeps the original spelling; equality and lookups go through
/// [`SkuCode::key`], which is trimmed and upper-cased.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SkuCode {
    raw: String,
    key: String,
}

impl SkuCode {
    pub fn parse(input: &str) -> DomainResult<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(DomainError::validation("sku code cannot be empty"));
        }
        Ok(Self {
            raw: raw.to_string(),
            key: Self::normalize(raw),
        })
    }

    /// Lookup key for case-insensitive matching.
    pub fn normalize(input: &str) -> String {
        input.trim().to_uppercase()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for SkuCode {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for SkuCode {}

impl core::hash::Hash for SkuCode {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl core::fmt::Display for SkuCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for SkuCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SkuCode> for String {
    fn from(value: SkuCode) -> Self {
        value.raw
    }
}

/// A sellable unit: one product in one colour and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sku {
    pub id: SkuId,
    pub code: SkuCode,
    #[serde(default)]
    pub barcode: Option<String>,
    pub product_name: String,
    pub colour: String,
    pub size: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Sku {
    /// True when `code` equals this SKU's code or barcode (case-insensitive).
    pub fn matches_scan(&self, code: &str) -> bool {
        let key = SkuCode::normalize(code);
        if key.is_empty() {
            return false;
        }
        self.code.key() == key
            || self
                .barcode
                .as_deref()
                .is_some_and(|b| SkuCode::normalize(b) == key)
    }

    /// Short human label, e.g. "Linen Shirt / Navy / M".
    pub fn label(&self) -> String {
        format!("{} / {} / {}", self.product_name, self.colour, self.size)
    }
}

/// Stock position of one SKU, folded from the ledger.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub total_inward: i64,
    pub total_outward: i64,
    pub reserved: i64,
}

impl StockBalance {
    /// Physical units on the books.
    pub fn current(&self) -> i64 {
        self.total_inward.saturating_sub(self.total_outward)
    }

    /// Units not held for allocated orders.
    pub fn available(&self) -> i64 {
        self.current().saturating_sub(self.reserved)
    }
}
