//! Material catalog and bill-of-materials recipes.

use std::collections::BTreeMap;
use std::path::Path;

use alerts::ThresholdTable;
use common::{ItemId, Quantity};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// One material consumed when producing a unit of a SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeComponent {
    pub material: String,
    pub quantity: i64,
}

impl RecipeComponent {
    pub fn new(material: impl Into<String>, quantity: i64) -> Self {
        Self {
            material: material.into(),
            quantity,
        }
    }
}

/// Materials by human name, recipes by SKU and per-item thresholds.
///
/// ```json
/// {
///   "materials": { "Steel sheet": "MAT-001" },
///   "recipes": { "SKU-CHAIR": [{ "material": "Steel sheet", "quantity": 2 }] },
///   "thresholds": { "MAT-001": 10 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    materials: BTreeMap<String, ItemId>,

    #[serde(default)]
    recipes: BTreeMap<String, Vec<RecipeComponent>>,

    #[serde(default)]
    thresholds: BTreeMap<ItemId, Quantity>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a catalog.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reads, parses and validates a catalog file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Checks that every material maps to a non-blank item id, no threshold
    /// is negative, and every recipe only uses known materials in positive
    /// quantities.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for (material, item_id) in &self.materials {
            if item_id.as_str().trim().is_empty() {
                return Err(CatalogError::BlankMaterialId {
                    material: material.clone(),
                });
            }
        }
        for (item_id, threshold) in &self.thresholds {
            if threshold.is_negative() {
                return Err(CatalogError::NegativeThreshold {
                    item_id: item_id.clone(),
                    threshold: *threshold,
                });
            }
        }
        for (sku, components) in &self.recipes {
            for component in components {
                if !self.materials.contains_key(&component.material) {
                    return Err(CatalogError::UnknownMaterial {
                        sku: sku.clone(),
                        material: component.material.clone(),
                    });
                }
                if component.quantity <= 0 {
                    return Err(CatalogError::InvalidComponent {
                        sku: sku.clone(),
                        material: component.material.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn with_material(mut self, name: impl Into<String>, item_id: impl Into<ItemId>) -> Self {
        self.materials.insert(name.into(), item_id.into());
        self
    }

    pub fn with_recipe(mut self, sku: impl Into<String>, components: Vec<RecipeComponent>) -> Self {
        self.recipes.insert(sku.into(), components);
        self
    }

    pub fn with_threshold(mut self, item_id: impl Into<ItemId>, threshold: Quantity) -> Self {
        self.thresholds.insert(item_id.into(), threshold);
        self
    }

    /// Looks up a material's item id by its exact name.
    pub fn material(&self, name: &str) -> Option<&ItemId> {
        self.materials.get(name)
    }

    pub fn recipe(&self, sku: &str) -> Option<&[RecipeComponent]> {
        self.recipes.get(sku).map(Vec::as_slice)
    }

    /// Materials as `(name, item id)`, ordered by name.
    pub fn materials(&self) -> impl Iterator<Item = (&str, &ItemId)> {
        self.materials.iter().map(|(name, id)| (name.as_str(), id))
    }

    pub fn thresholds(&self) -> &BTreeMap<ItemId, Quantity> {
        &self.thresholds
    }

    /// Builds a threshold table from the catalog's per-item thresholds over
    /// the given default.
    pub fn threshold_table(&self, default: Option<Quantity>) -> ThresholdTable {
        self.thresholds
            .iter()
            .fold(ThresholdTable::new(default), |table, (id, threshold)| {
                table.with_override(id.clone(), *threshold)
            })
    }
}
