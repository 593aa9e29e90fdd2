//! SKU directory: lookups by id, code and barcode.

use stockroom_core::{DomainError, SkuId};
use stockroom_inventory::{Sku, SkuCode};

use crate::error::{ServiceError, ServiceResult, StoreError};
use crate::store::{InMemoryKeyedStore, KeyedStore};

#[derive(Debug)]
pub struct SkuCatalog {
    skus: InMemoryKeyedStore<SkuId, Sku>,
}

impl Default for SkuCatalog {
    fn default() -> Self {
        Self {
            skus: InMemoryKeyedStore::new("sku"),
        }
    }
}

impl SkuCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a SKU. Codes are unique case-insensitively.
    pub fn insert(&self, sku: Sku) -> ServiceResult<()> {
        if let Some(existing) = self.by_code(sku.code.as_str())? {
            if existing.id != sku.id {
                return Err(DomainError::conflict(format!("sku code {} already exists", sku.code)).into());
            }
        }
        self.skus.upsert(sku.id, sku)?;
        Ok(())
    }

    pub fn get(&self, id: SkuId) -> Result<Option<Sku>, StoreError> {
        self.skus.get(&id)
    }

    /// Like [`SkuCatalog::get`], but a missing SKU is `NotFound`.
    pub fn require(&self, id: SkuId) -> ServiceResult<Sku> {
        self.get(id)?
            .ok_or_else(|| ServiceError::not_found(format!("sku {id}")))
    }

    pub fn by_code(&self, code: &str) -> Result<Option<Sku>, StoreError> {
        let key = SkuCode::normalize(code);
        Ok(self.skus.list()?.into_iter().find(|s| s.code.key() == key))
    }

    /// Resolve a typed or scanned code: SKU code first, then barcode.
    pub fn resolve_scan(&self, code: &str) -> ServiceResult<Sku> {
        if code.trim().is_empty() {
            return Err(DomainError::validation("scan code cannot be empty").into());
        }
        let all = self.skus.list()?;
        let key = SkuCode::normalize(code);
        all.iter()
            .find(|s| s.code.key() == key)
            .or_else(|| all.iter().find(|s| s.matches_scan(code)))
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("sku or barcode '{}'", code.trim())))
    }

    /// Active SKUs ordered by code.
    pub fn active(&self) -> Result<Vec<Sku>, StoreError> {
        let mut skus: Vec<Sku> = self.skus.list()?.into_iter().filter(|s| s.is_active).collect();
        skus.sort_by(|a, b| a.code.key().cmp(b.code.key()));
        Ok(skus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(code: &str, barcode: Option<&str>, active: bool) -> Sku {
        Sku {
            id: SkuId::new(),
            code: SkuCode::parse(code).unwrap(),
            barcode: barcode.map(str::to_string),
            product_name: "Kurta".into(),
            colour: "Ivory".into(),
            size: "S".into(),
            is_active: active,
        }
    }

    #[test]
    fn scan_resolves_code_then_barcode() {
        let catalog = SkuCatalog::new();
        let a = sku("KUR-IVR-S", Some("890100"), true);
        catalog.insert(a.clone()).unwrap();

        assert_eq!(catalog.resolve_scan(" kur-ivr-s ").unwrap().id, a.id);
        assert_eq!(catalog.resolve_scan("890100").unwrap().id, a.id);
        assert!(matches!(
            catalog.resolve_scan("nope"),
            Err(ServiceError::Domain(DomainError::NotFound(_)))
        ));
        assert!(matches!(
            catalog.resolve_scan("  "),
            Err(ServiceError::Domain(DomainError::Validation(_)))
        ));
    }

    #[test]
    fn duplicate_codes_conflict() {
        let catalog = SkuCatalog::new();
        catalog.insert(sku("A", None, true)).unwrap();
        assert!(matches!(
            catalog.insert(sku("a", None, true)),
            Err(ServiceError::Domain(DomainError::Conflict(_)))
        ));
    }

    #[test]
    fn active_excludes_inactive_and_sorts() {
        let catalog = SkuCatalog::new();
        catalog.insert(sku("B", None, true)).unwrap();
        catalog.insert(sku("A", None, true)).unwrap();
        catalog.insert(sku("C", None, false)).unwrap();
        let codes: Vec<_> = catalog.active().unwrap().into_iter().map(|s| s.code.to_string()).collect();
        assert_eq!(codes, vec!["A", "B"]);
    }
}
