//! Definition registry.
//!
//! Holds validated definitions in registration order with a name index.
//! A registry is immutable once built; reloads build a new one and swap it
//! in through `RegistryHandle`, so a tick always sees one consistent set.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::definition::{validate_definition, NpcDefinition};
use crate::error::NpcError;

#[derive(Debug, Default)]
pub struct DefinitionRegistry {
    definitions: Vec<Arc<NpcDefinition>>,
    by_name: HashMap<String, usize>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a definition.
    pub fn register(&mut self, definition: NpcDefinition) -> Result<Arc<NpcDefinition>, NpcError> {
        let issues = validate_definition(&definition, None);
        if !issues.is_empty() {
            return Err(NpcError::Validation {
                name: definition.name.clone(),
                issues,
            });
        }
        self.insert(definition)
    }

    /// Append a definition that has already been validated.
    pub(crate) fn insert(
        &mut self,
        definition: NpcDefinition,
    ) -> Result<Arc<NpcDefinition>, NpcError> {
        if self.by_name.contains_key(&definition.name) {
            return Err(NpcError::DuplicateDefinition(definition.name));
        }
        let definition = Arc::new(definition);
        self.by_name
            .insert(definition.name.clone(), self.definitions.len());
        self.definitions.push(Arc::clone(&definition));
        Ok(definition)
    }

    /// Register many, logging and skipping the ones that fail
    pub fn register_all(&mut self, definitions: impl IntoIterator<Item = NpcDefinition>) -> usize {
        let mut added = 0;
        for definition in definitions {
            match self.register(definition) {
                Ok(_) => added += 1,
                Err(err) => warn!(error = %err, "Skipping custom NPC definition"),
            }
        }
        added
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Arc<NpcDefinition>> {
        self.by_name.get(name).map(|&i| &self.definitions[i])
    }

    /// Definitions in registration order
    pub fn all(&self) -> &[Arc<NpcDefinition>] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Unbind every script hook. Live attachments keep their definition data.
    pub fn dispose_all(&self) {
        for definition in &self.definitions {
            definition.dispose();
        }
    }
}

/// Shared, swappable registry pointer.
#[derive(Debug, Default)]
pub struct RegistryHandle {
    current: RwLock<Arc<DefinitionRegistry>>,
}

impl RegistryHandle {
    pub fn new(registry: DefinitionRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    /// The registry as of now; later swaps do not affect the snapshot
    pub fn snapshot(&self) -> Arc<DefinitionRegistry> {
        Arc::clone(&self.current.read())
    }

    /// Dispose the old registry's hooks, then install `registry`.
    pub fn replace(&self, registry: DefinitionRegistry) {
        let mut current = self.current.write();
        current.dispose_all();
        info!(
            previous = current.len(),
            loaded = registry.len(),
            "Swapped custom NPC definitions"
        );
        *current = Arc::new(registry);
    }
}
