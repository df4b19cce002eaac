use std::path::Path;

use super::{BaseOverride, LootDefinition, NpcDefinition};
use crate::constants::{MAX_BUFF_TYPES, MAX_NPC_TYPES, MIN_NPC_TYPE};
use crate::error::ValidationIssue;

/// Collect every problem with a definition instead of stopping at the first.
///
/// `script_root` is the directory script paths are resolved against; when
/// `None` the script file is not checked.
pub fn validate_definition(
    definition: &NpcDefinition,
    script_root: Option<&Path>,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let name = definition.name.as_str();

    if name.trim().is_empty() {
        issues.push(ValidationIssue::new("Name is whitespace."));
    }
    if name.trim().parse::<i64>().is_ok() {
        issues.push(ValidationIssue::new("Name cannot be a number."));
    }
    if definition.base_type < MIN_NPC_TYPE {
        issues.push(ValidationIssue::new("BaseType is too small."));
    }
    if definition.base_type >= MAX_NPC_TYPES {
        issues.push(ValidationIssue::new("BaseType is too large."));
    }
    if let (Some(script), Some(root)) = (&definition.script_path, script_root) {
        if !root.join(script).is_file() {
            issues.push(ValidationIssue::new(
                "ScriptPath points to an invalid script file.",
            ));
        }
    }

    validate_override(&definition.base_override, &mut issues);
    validate_loot(&definition.loot, &mut issues);
    validate_spawning(definition, &mut issues);
    issues
}

fn validate_override(o: &BaseOverride, issues: &mut Vec<ValidationIssue>) {
    if let Some(ids) = &o.buff_immunities {
        if ids.iter().any(|&id| id <= 0 || id as usize >= MAX_BUFF_TYPES) {
            issues.push(ValidationIssue::new(
                "BuffImmunities must contain valid buff types.",
            ));
        }
    }
    if o.defense.is_some_and(|v| v < 0) {
        issues.push(ValidationIssue::new("Defense must be non-negative."));
    }
    if o.knockback_multiplier.is_some_and(|v| v < 0.0) {
        issues.push(ValidationIssue::new(
            "KnockbackMultiplier must be non-negative.",
        ));
    }
    if o.max_hp.is_some_and(|v| v < 0) {
        issues.push(ValidationIssue::new("MaxHp must be non-negative."));
    }
    if o.npc_slots.is_some_and(|v| v < 0.0) {
        issues.push(ValidationIssue::new("NpcSlots must be non-negative."));
    }
    if o.value.is_some_and(|v| v < 0.0) {
        issues.push(ValidationIssue::new("Value must be non-negative."));
    }
}

fn validate_loot(loot: &LootDefinition, issues: &mut Vec<ValidationIssue>) {
    let Some(entries) = &loot.entries else {
        issues.push(ValidationIssue::new("Loot entries is null."));
        return;
    };

    for entry in entries {
        if entry.item_id <= 0 {
            issues.push(ValidationIssue::new(format!(
                "Loot entry type {} is invalid.",
                entry.item_id
            )));
        }
        if entry.min_stack_size < 1 {
            issues.push(ValidationIssue::new("MinStackSize must be at least 1."));
        }
        if entry.max_stack_size < entry.min_stack_size {
            issues.push(ValidationIssue::new(
                "MaxStackSize must be at least MinStackSize.",
            ));
        }
        if !(0.0..=1.0).contains(&entry.chance) {
            issues.push(ValidationIssue::new("Chance must be between 0 and 1."));
        }
    }
}

fn validate_spawning(definition: &NpcDefinition, issues: &mut Vec<ValidationIssue>) {
    let spawning = &definition.spawning;
    if let Some(target) = spawning.replacement_target_type {
        if !(MIN_NPC_TYPE..MAX_NPC_TYPES).contains(&target) {
            issues.push(ValidationIssue::new(
                "ReplacementTargetType is out of range.",
            ));
        }
    }
    if spawning
        .replacement_chance
        .is_some_and(|c| !(0.0..=1.0).contains(&c))
    {
        issues.push(ValidationIssue::new(
            "ReplacementChance must be between 0 and 1.",
        ));
    }
    if spawning
        .spawn_rate_multiplier
        .is_some_and(|m| !m.is_finite() || m < 0.0)
    {
        issues.push(ValidationIssue::new(
            "SpawnRateMultiplier must be non-negative.",
        ));
    }
}
