//! Definition file loading.
//!
//! The definitions file is a JSON array. Each element is either a definition
//! or a category placeholder pulling in more files:
//!
//! ```json
//! [
//!   { "Name": "cave-bat-swarm", "BaseType": 49 },
//!   { "Category": "bosses", "Includes": ["bosses/slime-king.json"] }
//! ]
//! ```
//!
//! Include paths resolve against the including file's directory and may nest.
//! Records that fail to parse or validate are logged and dropped; only an
//! unreadable or malformed top-level file is an error.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::definition::{validate_definition, NpcDefinition};
use crate::error::NpcError;
use crate::registry::DefinitionRegistry;
use crate::scripting::ScriptLibrary;

/// Default location, relative to the server's working directory
pub const DEFAULT_DEFINITIONS_PATH: &str = "npcs/npcs.json";

/// Nesting limit for category includes
const MAX_INCLUDE_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CategoryPlaceholder {
    category: String,
    #[serde(default)]
    includes: Vec<String>,
}

pub struct DefinitionLoader {
    path: PathBuf,
    script_root: Option<PathBuf>,
    library: ScriptLibrary,
}

impl DefinitionLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            script_root: None,
            library: ScriptLibrary::new(),
        }
    }

    /// Directory script paths are checked against during validation
    pub fn with_script_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.script_root = Some(root.into());
        self
    }

    pub fn with_library(mut self, library: ScriptLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn library(&self) -> &ScriptLibrary {
        &self.library
    }

    /// Build a fresh registry from the definitions file.
    ///
    /// A missing file yields an empty registry.
    pub fn load(&self) -> Result<DefinitionRegistry, NpcError> {
        let mut registry = DefinitionRegistry::new();
        if !self.path.exists() {
            warn!(path = %self.path.display(), "Definitions file not found");
            return Ok(registry);
        }

        let mut visited = HashSet::new();
        let definitions = read_file(&self.path, 0, &mut visited)?;
        let total = definitions.len();

        for sourced in definitions {
            let definition = match self.validate(sourced) {
                Ok(definition) => definition,
                Err(err) => {
                    error!(error = %err, "Dropping custom NPC definition");
                    continue;
                }
            };
            self.library.link(&definition);
            if let Err(err) = registry.insert(definition) {
                error!(error = %err, "Dropping custom NPC definition");
            }
        }

        info!(
            path = %self.path.display(),
            loaded = registry.len(),
            dropped = total - registry.len(),
            "Loaded custom NPC definitions"
        );
        Ok(registry)
    }

    /// Issues are tagged with the file the record was read from.
    fn validate(&self, sourced: Sourced) -> Result<NpcDefinition, NpcError> {
        let Sourced { definition, file } = sourced;
        let issues = validate_definition(&definition, self.script_root.as_deref());
        if issues.is_empty() {
            return Ok(definition);
        }
        let source = file.display().to_string();
        Err(NpcError::Validation {
            name: definition.name,
            issues: issues
                .into_iter()
                .map(|issue| issue.with_source(source.clone()))
                .collect(),
        })
    }
}

/// A parsed definition and the file it came from
struct Sourced {
    definition: NpcDefinition,
    file: PathBuf,
}

fn read_file(
    path: &Path,
    depth: usize,
    visited: &mut HashSet<PathBuf>,
) -> Result<Vec<Sourced>, NpcError> {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(key) {
        warn!(path = %path.display(), "Skipping already included definitions file");
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut definitions = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        if record.get("Category").is_some() {
            match CategoryPlaceholder::deserialize(&record) {
                Ok(category) => {
                    definitions.extend(expand_category(&category, base, depth, visited))
                }
                Err(err) => warn!(path = %path.display(), index, error = %err, "Invalid category"),
            }
            continue;
        }
        match NpcDefinition::deserialize(&record) {
            Ok(definition) => definitions.push(Sourced {
                definition,
                file: path.to_path_buf(),
            }),
            Err(err) => {
                let name = record.get("Name").and_then(|n| n.as_str()).unwrap_or("?");
                error!(path = %path.display(), index, name, error = %err, "Invalid definition record");
            }
        }
    }
    Ok(definitions)
}

fn expand_category(
    category: &CategoryPlaceholder,
    base: &Path,
    depth: usize,
    visited: &mut HashSet<PathBuf>,
) -> Vec<Sourced> {
    if depth >= MAX_INCLUDE_DEPTH {
        warn!(category = %category.category, "Category includes nested too deeply");
        return Vec::new();
    }

    let mut definitions = Vec::new();
    for include in &category.includes {
        let path = base.join(include);
        match read_file(&path, depth + 1, visited) {
            Ok(found) => definitions.extend(found),
            Err(err) => warn!(
                category = %category.category,
                include = %path.display(),
                error = %err,
                "Could not load category include"
            ),
        }
    }
    definitions
}

/// Write the registry back out as a flat definitions array.
pub fn save_definitions(path: &Path, registry: &DefinitionRegistry) -> Result<(), NpcError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let definitions: Vec<&NpcDefinition> = registry.all().iter().map(|d| &**d).collect();
    fs::write(path, serde_json::to_string_pretty(&definitions)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripting::{HookKind, HookTable};

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DefinitionLoader::new(dir.path().join("npcs.json")).load().unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_malformed_top_level_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "npcs.json", "{ \"Name\": ");
        assert!(matches!(
            DefinitionLoader::new(path).load(),
            Err(NpcError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_records_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "npcs.json",
            r#"[
                { "Name": "good", "BaseType": 1 },
                { "Name": "12", "BaseType": 1 },
                { "Name": "no-base" },
                { "Name": "good", "BaseType": 2 },
                { "Name": "also-good", "BaseType": 3 }
            ]"#,
        );
        let registry = DefinitionLoader::new(path).load().unwrap();
        let names: Vec<&str> = registry.all().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["good", "also-good"]);
        assert_eq!(registry.find_by_name("good").unwrap().base_type, 1);
    }

    #[test]
    fn test_category_includes_expand_in_place() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "bosses/kings.json",
            r#"[ { "Name": "slime-king", "BaseType": 1 },
                 { "Category": "nested", "Includes": ["deeper.json"] } ]"#,
        );
        write(
            dir.path(),
            "bosses/deeper.json",
            r#"[ { "Name": "deep-king", "BaseType": 2 } ]"#,
        );
        let path = write(
            dir.path(),
            "npcs.json",
            r#"[ { "Name": "first", "BaseType": 3 },
                 { "Category": "bosses", "Includes": ["bosses/kings.json", "bosses/missing.json"] },
                 { "Name": "last", "BaseType": 4 } ]"#,
        );

        let registry = DefinitionLoader::new(path).load().unwrap();
        let names: Vec<&str> = registry.all().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["first", "slime-king", "deep-king", "last"]);
    }

    #[test]
    fn test_validation_issues_name_their_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "bosses/kings.json",
            r#"[ { "Name": "99", "BaseType": 1 } ]"#,
        );
        let path = write(
            dir.path(),
            "npcs.json",
            r#"[ { "Category": "bosses", "Includes": ["bosses/kings.json"] } ]"#,
        );

        let mut visited = HashSet::new();
        let mut records = read_file(&path, 0, &mut visited).unwrap();
        assert_eq!(records.len(), 1);
        let sourced = records.remove(0);
        assert!(sourced.file.ends_with("bosses/kings.json"));

        let err = DefinitionLoader::new(&path).validate(sourced).unwrap_err();
        let NpcError::Validation { issues, .. } = err else {
            panic!("expected a validation error");
        };
        assert!(!issues.is_empty());
        assert!(issues
            .iter()
            .all(|issue| issue.source.as_deref().is_some_and(|s| s.ends_with("kings.json"))));
    }

    #[test]
    fn test_include_cycle_terminates() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "a.json",
            r#"[ { "Name": "a", "BaseType": 1 }, { "Category": "loop", "Includes": ["b.json"] } ]"#,
        );
        write(
            dir.path(),
            "b.json",
            r#"[ { "Name": "b", "BaseType": 1 }, { "Category": "loop", "Includes": ["a.json"] } ]"#,
        );
        let registry = DefinitionLoader::new(dir.path().join("a.json")).load().unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_scripts_linked_and_checked() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scripts/bat.boo", "");
        let path = write(
            dir.path(),
            "npcs.json",
            r#"[ { "Name": "bat", "BaseType": 49, "ScriptPath": "bat.boo" },
                 { "Name": "ghost", "BaseType": 49, "ScriptPath": "ghost.boo" } ]"#,
        );
        let mut library = ScriptLibrary::new();
        library.register("bat.boo", HookTable::new().on_spawn(|_, _| Ok(())));

        let registry = DefinitionLoader::new(path)
            .with_script_root(dir.path().join("scripts"))
            .with_library(library)
            .load()
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry
            .find_by_name("bat")
            .unwrap()
            .hooks()
            .is_bound(HookKind::Spawn));
    }

    #[test]
    fn test_save_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = DefinitionRegistry::new();
        registry.register(NpcDefinition::new("saved", 7)).unwrap();
        let path = dir.path().join("out").join("npcs.json");
        save_definitions(&path, &registry).unwrap();

        let reloaded = DefinitionLoader::new(&path).load().unwrap();
        assert_eq!(reloaded.find_by_name("saved").unwrap().base_type, 7);
    }
}
