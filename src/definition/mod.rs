//! Custom NPC definitions.
//!
//! A definition maps a vanilla base archetype onto a set of attribute
//! overrides, a loot table, spawning rules and optional script hooks.
//! Definitions are deserialized from the definitions file, validated once,
//! linked to their script module, and then shared read-only between the
//! registry and every live NPC they govern.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::scripting::HookTable;

mod validation;

pub use validation::validate_definition;

/// Attribute overrides applied on top of the base archetype's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BaseOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_style: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buff_immunities: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defense: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_no_collision: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_no_gravity: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_boss: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_immortal: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_immune_to_lava: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_trap_immune: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knockback_multiplier: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub npc_slots: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behind_tiles: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dont_take_damage_from_hostiles: Option<bool>,
}

/// One extra item drop rolled independently on death.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LootEntry {
    #[serde(rename = "Type")]
    pub item_id: i32,
    #[serde(default)]
    pub prefix: u8,
    #[serde(default = "default_stack")]
    pub min_stack_size: i32,
    #[serde(default = "default_stack")]
    pub max_stack_size: i32,
    #[serde(default = "default_chance")]
    pub chance: f64,
}

fn default_stack() -> i32 {
    1
}

fn default_chance() -> f64 {
    1.0
}

impl LootEntry {
    pub fn new(item_id: i32, min_stack_size: i32, max_stack_size: i32, chance: f64) -> Self {
        Self {
            item_id,
            prefix: 0,
            min_stack_size,
            max_stack_size,
            chance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LootDefinition {
    pub tally_kills: bool,
    pub is_override: bool,
    /// `None` only when the file explicitly nulls the list; rejected by validation
    pub entries: Option<Vec<LootEntry>>,
}

impl Default for LootDefinition {
    fn default() -> Self {
        Self {
            tally_kills: false,
            is_override: false,
            entries: Some(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpawningDefinition {
    pub should_spawn: bool,
    pub should_replace: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_target_type: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_chance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spawn_rate_multiplier: Option<f64>,
}

/// A named custom NPC definition.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NpcDefinition {
    pub name: String,
    pub base_type: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(default)]
    pub base_override: BaseOverride,
    #[serde(default)]
    pub loot: LootDefinition,
    #[serde(default)]
    pub spawning: SpawningDefinition,
    #[serde(skip)]
    hooks: RwLock<HookTable>,
}

impl NpcDefinition {
    pub fn new(name: impl Into<String>, base_type: i32) -> Self {
        Self {
            name: name.into(),
            base_type,
            script_path: None,
            base_override: BaseOverride::default(),
            loot: LootDefinition::default(),
            spawning: SpawningDefinition::default(),
            hooks: RwLock::new(HookTable::default()),
        }
    }

    pub fn with_script(mut self, script_path: impl Into<String>) -> Self {
        self.script_path = Some(script_path.into());
        self
    }

    pub fn with_override(mut self, base_override: BaseOverride) -> Self {
        self.base_override = base_override;
        self
    }

    pub fn with_loot(mut self, loot: LootDefinition) -> Self {
        self.loot = loot;
        self
    }

    pub fn with_spawning(mut self, spawning: SpawningDefinition) -> Self {
        self.spawning = spawning;
        self
    }

    pub fn with_hooks(self, hooks: HookTable) -> Self {
        *self.hooks.write() = hooks;
        self
    }

    /// Snapshot of the bound hooks; cheap, every slot is an `Arc`
    pub fn hooks(&self) -> HookTable {
        self.hooks.read().clone()
    }

    /// Replace the hook bindings, returning whether any hook was bound
    pub fn link_hooks(&self, hooks: HookTable) -> bool {
        let any = !hooks.is_empty();
        *self.hooks.write() = hooks;
        any
    }

    /// Drop every hook binding. Called before a registry is replaced.
    pub fn dispose(&self) {
        *self.hooks.write() = HookTable::default();
    }

    pub fn loot_entries(&self) -> &[LootEntry] {
        self.loot.entries.as_deref().unwrap_or(&[])
    }

    pub fn should_override_loot(&self) -> bool {
        self.loot.is_override
    }

    pub fn should_tally_kills(&self) -> bool {
        self.loot.tally_kills
    }

    pub fn should_spawn(&self) -> bool {
        self.spawning.should_spawn
    }

    /// Archetype this definition replaces, if it takes part in replacement.
    /// An explicit target wins; otherwise `should_replace` targets the base type.
    pub fn replacement_target(&self) -> Option<i32> {
        self.spawning
            .replacement_target_type
            .or_else(|| self.spawning.should_replace.then_some(self.base_type))
    }

    pub fn replacement_chance(&self) -> f64 {
        self.spawning.replacement_chance.unwrap_or(0.0)
    }

    pub fn spawn_rate_multiplier(&self) -> f64 {
        self.spawning.spawn_rate_multiplier.unwrap_or(1.0)
    }

    /// Overrides that clients cannot infer and must be resent every tick
    pub fn should_aggressively_update(&self) -> bool {
        let o = &self.base_override;
        o.ai_style.is_some()
            || o.buff_immunities.is_some()
            || o.is_immune_to_lava.is_some()
            || o.has_no_collision.is_some()
            || o.has_no_gravity.is_some()
    }

    /// Overrides that change how a strike resolves on the client
    pub fn should_update_on_hit(&self) -> bool {
        let o = &self.base_override;
        o.defense.is_some() || o.is_immortal.is_some() || o.knockback_multiplier.is_some()
    }
}
