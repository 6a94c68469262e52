use crate::errors::CatalogError;
use schema::{ItemData, MoveData, SpeciesData};
use serde::Deserialize;
use std::collections::HashMap;

const STANDARD_CATALOG: &str = include_str!("../data/standard_catalog.ron");

/// On-disk layout of a catalog file.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    moves: Vec<MoveData>,
    #[serde(default)]
    items: Vec<ItemData>,
    #[serde(default)]
    species: Vec<SpeciesData>,
}

/// Read-only game data shared by every battle session.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    moves: HashMap<String, MoveData>,
    items: HashMap<String, ItemData>,
    species: HashMap<String, SpeciesData>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog bundled with the engine.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::from_ron_str(STANDARD_CATALOG)
    }

    pub fn from_ron_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            ron::from_str(source).map_err(|e| CatalogError::Malformed(e.to_string()))?;

        let mut catalog = Self::new();
        for move_data in file.moves {
            catalog.insert_move(move_data)?;
        }
        for item in file.items {
            catalog.insert_item(item)?;
        }
        for species in file.species {
            catalog.insert_species(species)?;
        }

        tracing::debug!(
            moves = catalog.moves.len(),
            items = catalog.items.len(),
            species = catalog.species.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    pub fn insert_move(&mut self, move_data: MoveData) -> Result<(), CatalogError> {
        if self.moves.contains_key(&move_data.id) {
            return Err(CatalogError::DuplicateEntry {
                kind: "move",
                id: move_data.id,
            });
        }
        self.moves.insert(move_data.id.clone(), move_data);
        Ok(())
    }

    pub fn insert_item(&mut self, item: ItemData) -> Result<(), CatalogError> {
        if self.items.contains_key(&item.id) {
            return Err(CatalogError::DuplicateEntry {
                kind: "item",
                id: item.id,
            });
        }
        self.items.insert(item.id.clone(), item);
        Ok(())
    }

    pub fn insert_species(&mut self, species: SpeciesData) -> Result<(), CatalogError> {
        if self.species.contains_key(&species.id) {
            return Err(CatalogError::DuplicateEntry {
                kind: "species",
                id: species.id,
            });
        }
        self.species.insert(species.id.clone(), species);
        Ok(())
    }

    pub fn move_data(&self, id: &str) -> Result<&MoveData, CatalogError> {
        self.moves
            .get(id)
            .ok_or_else(|| CatalogError::MoveNotFound(id.to_string()))
    }

    pub fn item(&self, id: &str) -> Result<&ItemData, CatalogError> {
        self.items
            .get(id)
            .ok_or_else(|| CatalogError::ItemNotFound(id.to_string()))
    }

    pub fn species(&self, id: &str) -> Result<&SpeciesData, CatalogError> {
        self.species
            .get(id)
            .ok_or_else(|| CatalogError::SpeciesNotFound(id.to_string()))
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use schema::{MoveCategory, PokemonType};

    #[test]
    fn standard_catalog_parses() {
        let catalog = Catalog::standard().expect("bundled catalog should parse");
        let tackle = catalog.move_data("tackle").unwrap();
        assert_eq!(tackle.move_type, PokemonType::Normal);
        assert_eq!(tackle.category, MoveCategory::Physical);
        assert!(catalog.item("potion").is_ok());
        assert!(catalog.species("pikachu").is_ok());
    }

    #[test]
    fn missing_entries_are_reported_by_id() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.move_data("splash"),
            Err(CatalogError::MoveNotFound("splash".to_string()))
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let source = r#"(
            moves: [
                (id: "tackle", name: "Tackle", move_type: Normal, category: Physical, power: Some(40), max_pp: 35),
                (id: "tackle", name: "Tackle", move_type: Normal, category: Physical, power: Some(40), max_pp: 35),
            ],
        )"#;
        let result = Catalog::from_ron_str(source);
        assert!(matches!(
            result,
            Err(CatalogError::DuplicateEntry { kind: "move", .. })
        ));
    }

    #[test]
    fn malformed_source_is_an_error() {
        assert!(matches!(
            Catalog::from_ron_str("(moves: [ nope"),
            Err(CatalogError::Malformed(_))
        ));
    }
}
