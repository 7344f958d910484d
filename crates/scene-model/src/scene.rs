//! Scenes and the ordered scene catalog.
//!
//! The catalog is fixed once at startup. Its order is both the launch
//! order of render processes and the concatenation order of the merge.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use scenemux_common::error::{SceneMuxError, SceneMuxResult};

/// Scenes rendered when no catalog override is configured.
pub const DEFAULT_SCENES: [&str; 5] = [
    "Introduction",
    "ProblemStatement",
    "FindSolution",
    "VerifySolution",
    "Conclusion",
];

/// One independently renderable unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scene {
    /// Scene class name passed to the render tool.
    pub name: String,

    /// Zero-based position in the catalog.
    pub index: usize,
}

/// Fixed, ordered list of scenes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCatalog {
    scenes: Vec<Scene>,
}

impl SceneCatalog {
    /// Build a catalog from scene names, keeping their order.
    ///
    /// Names must be non-empty, unique, and usable as a file stem.
    pub fn new<I, S>(names: I) -> SceneMuxResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut scenes = Vec::new();

        for (index, name) in names.into_iter().enumerate() {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(SceneMuxError::validation(format!(
                    "Scene name at position {index} is empty"
                )));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(SceneMuxError::validation(format!(
                    "Scene name {name:?} is not a valid file name"
                )));
            }
            if !seen.insert(name.clone()) {
                return Err(SceneMuxError::validation(format!(
                    "Scene {name} is listed more than once"
                )));
            }
            scenes.push(Scene { name, index });
        }

        if scenes.is_empty() {
            return Err(SceneMuxError::validation("Scene catalog is empty"));
        }

        Ok(Self { scenes })
    }

    /// The built-in five-scene catalog.
    pub fn builtin() -> Self {
        Self {
            scenes: DEFAULT_SCENES
                .iter()
                .enumerate()
                .map(|(index, name)| Scene {
                    name: (*name).to_string(),
                    index,
                })
                .collect(),
        }
    }

    /// Parse a comma-separated list such as `"Intro,Outro"`.
    pub fn parse_list(list: &str) -> SceneMuxResult<Self> {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scene> {
        self.scenes.iter()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a SceneCatalog {
    type Item = &'a Scene;
    type IntoIter = std::slice::Iter<'a, Scene>;

    fn into_iter(self) -> Self::IntoIter {
        self.scenes.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_builtin_catalog_order() {
        let catalog = SceneCatalog::builtin();
        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.scenes()[2].name, "FindSolution");
        for (i, scene) in catalog.iter().enumerate() {
            assert_eq!(scene.index, i);
        }
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(SceneCatalog::new(["A", "B", "A"]).is_err());
        assert!(SceneCatalog::new(["A", " "]).is_err());
        assert!(SceneCatalog::new(Vec::<String>::new()).is_err());
        assert!(SceneCatalog::new(["../escape"]).is_err());
    }

    #[test]
    fn test_parse_list_trims_entries() {
        let catalog = SceneCatalog::parse_list(" Intro , Body,Outro ,").unwrap();
        assert_eq!(catalog.names(), vec!["Intro", "Body", "Outro"]);
        assert_eq!(catalog.get("Body").map(|s| s.index), Some(1));
    }

    proptest! {
        #[test]
        fn prop_catalog_preserves_input_order(
            names in proptest::collection::hash_set("[A-Z][a-zA-Z0-9]{0,12}", 1..12)
        ) {
            let names: Vec<String> = names.into_iter().collect();
            let catalog = SceneCatalog::new(names.clone()).unwrap();
            prop_assert_eq!(catalog.len(), names.len());
            for (i, scene) in catalog.iter().enumerate() {
                prop_assert_eq!(&scene.name, &names[i]);
                prop_assert_eq!(scene.index, i);
            }
        }
    }
}
