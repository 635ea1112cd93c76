// THEORY:
// A `Profile` is the operator's sorting plan for one run: a named set of categories,
// each keyed by a short identifier. It is built once from a JSON document at startup
// and from then on the only thing that changes inside it is categories receiving
// their bins as they are first routed.
//
// Key architectural principles:
// 1.  **Validate at the Boundary**: Everything that could make routing ambiguous is
//     rejected while loading: duplicate category ids (the classifier breaks ties on
//     id), empty keys and names, malformed tags. After `Profile::new` succeeds the
//     router can trust the profile.
// 2.  **Deterministic Walk**: Categories are held in a `BTreeMap`, so iterating a
//     profile always visits categories in the same order.
// 3.  **Document vs. Model**: The serde document types mirror the file format; the
//     `Profile`/`Category` model carries run state (bins, contents) the file never
//     contains.

use crate::core_modules::bin_grid::BinLocation;
use crate::core_modules::category::Category;
use crate::core_modules::item::Characteristic;
use crate::error::ProfileParseError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// On-disk shape of a profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileDocument {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub description: Option<String>,
    pub categories: BTreeMap<String, CategoryDocument>,
}

/// On-disk shape of a category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryDocument {
    pub name: String,
    pub id: u32,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub defaults: Vec<Characteristic>,
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub name: String,
    pub id: u32,
    pub description: Option<String>,
    categories: BTreeMap<String, Category>,
}

impl Profile {
    /// Builds a validated profile from keyed categories.
    pub fn new(
        name: impl Into<String>,
        id: u32,
        categories: impl IntoIterator<Item = (String, Category)>,
    ) -> Result<Self, ProfileParseError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProfileParseError::Invalid("profile name is empty".into()));
        }

        let mut keyed = BTreeMap::new();
        let mut ids: HashMap<u32, String> = HashMap::new();
        for (key, category) in categories {
            if key.trim().is_empty() {
                return Err(ProfileParseError::Invalid(format!(
                    "category '{}' has an empty key",
                    category.name
                )));
            }
            if category.name.trim().is_empty() {
                return Err(ProfileParseError::Invalid(format!(
                    "category '{key}' has an empty name"
                )));
            }
            if let Some(other) = ids.insert(category.id, key.clone()) {
                return Err(ProfileParseError::Invalid(format!(
                    "categories '{other}' and '{key}' share id {}",
                    category.id
                )));
            }
            if keyed.contains_key(&key) {
                return Err(ProfileParseError::Invalid(format!(
                    "category key '{key}' is used twice"
                )));
            }
            keyed.insert(key, category);
        }

        if keyed.is_empty() {
            return Err(ProfileParseError::Invalid(format!(
                "profile '{name}' defines no categories"
            )));
        }

        Ok(Self {
            name,
            id,
            description: None,
            categories: keyed,
        })
    }

    pub fn from_document(document: ProfileDocument) -> Result<Self, ProfileParseError> {
        let categories = document.categories.into_iter().map(|(key, c)| {
            (key, Category::new(c.name, c.id, c.characteristics, c.defaults))
        });
        let mut profile = Self::new(document.name, document.id, categories)?;
        profile.description = document.description;
        Ok(profile)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ProfileParseError> {
        let document: ProfileDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileParseError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ProfileParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.get(key)
    }

    pub(crate) fn category_mut(&mut self, key: &str) -> Option<&mut Category> {
        self.categories.get_mut(key)
    }

    /// Categories in key order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &Category)> {
        self.categories.iter().map(|(key, category)| (key.as_str(), category))
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Every bound category with its bin, in the order the bins were handed out.
    pub fn bindings(&self) -> Vec<(String, BinLocation)> {
        let mut bound: Vec<(String, BinLocation)> = self
            .categories
            .iter()
            .filter_map(|(key, category)| category.bin().map(|bin| (key.clone(), bin)))
            .collect();
        bound.sort_by_key(|(_, bin)| (bin.row, bin.column));
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PROFILE: &str = r#"{
        "name": "Basic bricks",
        "id": 7,
        "description": "Bricks by color, plates together, everything else last",
        "categories": {
            "red_bricks": { "name": "Red bricks", "id": 1, "characteristics": ["brick", "color=red"] },
            "plates": { "name": "Plates", "id": 2, "characteristics": ["Plate"], "defaults": ["color=gray"] },
            "misc": { "name": "Everything else", "id": 99 }
        }
    }"#;

    #[test]
    fn parses_a_well_formed_document() {
        let profile = Profile::from_json_str(PROFILE).unwrap();
        assert_eq!(profile.name, "Basic bricks");
        assert_eq!(profile.id, 7);
        assert_eq!(profile.len(), 3);

        let plates = profile.category("plates").unwrap();
        assert_eq!(plates.characteristics[0].as_str(), "plate");
        assert_eq!(plates.defaults[0].as_str(), "color=gray");
        assert!(profile.category("misc").unwrap().is_catch_all());
        assert!(profile.bindings().is_empty());
    }

    #[test]
    fn categories_iterate_in_key_order() {
        let profile = Profile::from_json_str(PROFILE).unwrap();
        let keys: Vec<&str> = profile.categories().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["misc", "plates", "red_bricks"]);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            Profile::from_json_str("{ \"name\": \"x\", "),
            Err(ProfileParseError::Json(_))
        ));
        assert!(matches!(
            Profile::from_json_str(r#"{"name":"x","id":1,"categories":{},"colour":"red"}"#),
            Err(ProfileParseError::Json(_))
        ));
    }

    #[test]
    fn rejects_malformed_characteristics() {
        let json = r#"{"name":"x","id":1,"categories":{"a":{"name":"A","id":1,"characteristics":["color="]}}}"#;
        assert!(matches!(Profile::from_json_str(json), Err(ProfileParseError::Json(_))));
    }

    #[test]
    fn rejects_duplicate_category_ids() {
        let json = r#"{"name":"x","id":1,"categories":{
            "a":{"name":"A","id":4},
            "b":{"name":"B","id":4}
        }}"#;
        assert!(matches!(Profile::from_json_str(json), Err(ProfileParseError::Invalid(_))));
    }

    #[test]
    fn rejects_empty_profiles_and_names() {
        assert!(matches!(
            Profile::from_json_str(r#"{"name":"x","id":1,"categories":{}}"#),
            Err(ProfileParseError::Invalid(_))
        ));
        assert!(matches!(
            Profile::from_json_str(r#"{"name":" ","id":1,"categories":{"a":{"name":"A","id":1}}}"#),
            Err(ProfileParseError::Invalid(_))
        ));
        assert!(matches!(
            Profile::from_json_str(r#"{"name":"x","id":1,"categories":{"a":{"name":"","id":1}}}"#),
            Err(ProfileParseError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_duplicate_keys_when_built_directly() {
        let categories = vec![
            ("a".to_string(), Category::new("A", 1, Vec::new(), Vec::new())),
            ("a".to_string(), Category::new("A again", 2, Vec::new(), Vec::new())),
        ];
        assert!(matches!(Profile::new("x", 1, categories), Err(ProfileParseError::Invalid(_))));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PROFILE.as_bytes()).unwrap();
        let profile = Profile::load(file.path()).unwrap();
        assert_eq!(profile.len(), 3);

        let missing = Profile::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ProfileParseError::Io { .. })));
    }
}
