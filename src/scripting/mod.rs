//! Script hook bindings and fault-isolated dispatch.
//!
//! Each definition carries a `HookTable`: one typed slot per lifecycle hook,
//! populated when definitions are linked against the `ScriptLibrary`. Hooks
//! are plain closures, so any embedded runtime can sit behind them.
//!
//! Every call goes through [`invoke`]:
//! - a single process-wide lock is held for exactly the duration of the call
//! - an `Err` or a panic is logged and replaced by the hook's neutral value
//! - the tick that made the call carries on

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{const_mutex, Mutex};
use tracing::{debug, error, warn};

use crate::definition::NpcDefinition;
use crate::director::CustomNpc;
use crate::error::{ScriptError, ScriptResult};
use crate::world::{GameWorld, NpcSlot, PlayerSlot, TilePoint};

/// Lifecycle points a script can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Spawn,
    CheckSpawn,
    Collision,
    Killed,
    Strike,
    AiUpdate,
    TileCollision,
    Transformed,
    CheckReplace,
}

impl HookKind {
    pub const ALL: [HookKind; 9] = [
        HookKind::Spawn,
        HookKind::CheckSpawn,
        HookKind::Collision,
        HookKind::Killed,
        HookKind::Strike,
        HookKind::AiUpdate,
        HookKind::TileCollision,
        HookKind::Transformed,
        HookKind::CheckReplace,
    ];

    /// Name of the script function bound to this hook
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Spawn => "OnSpawn",
            HookKind::CheckSpawn => "OnCheckSpawn",
            HookKind::Collision => "OnCollision",
            HookKind::Killed => "OnKilled",
            HookKind::Strike => "OnStrike",
            HookKind::AiUpdate => "OnAiUpdate",
            HookKind::TileCollision => "OnTileCollision",
            HookKind::Transformed => "OnTransformed",
            HookKind::CheckReplace => "OnCheckReplace",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Damage report handed to `OnStrike`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    pub player: PlayerSlot,
    pub damage: i32,
    pub knockback: f32,
    pub critical: bool,
}

pub type NpcHook = Arc<dyn Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<()> + Send + Sync>;
pub type CheckSpawnHook =
    Arc<dyn Fn(&mut dyn GameWorld, PlayerSlot, i32, i32) -> ScriptResult<bool> + Send + Sync>;
pub type CollisionHook =
    Arc<dyn Fn(&mut dyn GameWorld, &CustomNpc, PlayerSlot) -> ScriptResult<()> + Send + Sync>;
pub type StrikeHook =
    Arc<dyn Fn(&mut dyn GameWorld, &CustomNpc, Strike) -> ScriptResult<bool> + Send + Sync>;
pub type AiUpdateHook =
    Arc<dyn Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<bool> + Send + Sync>;
pub type TileCollisionHook =
    Arc<dyn Fn(&mut dyn GameWorld, &CustomNpc, &[TilePoint]) -> ScriptResult<()> + Send + Sync>;
pub type CheckReplaceHook =
    Arc<dyn Fn(&mut dyn GameWorld, NpcSlot) -> ScriptResult<f64> + Send + Sync>;

/// Typed hook slots for one definition. Cloning shares the closures.
#[derive(Clone, Default)]
pub struct HookTable {
    spawn: Option<NpcHook>,
    check_spawn: Option<CheckSpawnHook>,
    collision: Option<CollisionHook>,
    killed: Option<NpcHook>,
    strike: Option<StrikeHook>,
    ai_update: Option<AiUpdateHook>,
    tile_collision: Option<TileCollisionHook>,
    transformed: Option<NpcHook>,
    check_replace: Option<CheckReplaceHook>,
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<&'static str> = HookKind::ALL
            .iter()
            .filter(|kind| self.is_bound(**kind))
            .map(HookKind::as_str)
            .collect();
        f.debug_struct("HookTable").field("bound", &bound).finish()
    }
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::Spawn => self.spawn.is_some(),
            HookKind::CheckSpawn => self.check_spawn.is_some(),
            HookKind::Collision => self.collision.is_some(),
            HookKind::Killed => self.killed.is_some(),
            HookKind::Strike => self.strike.is_some(),
            HookKind::AiUpdate => self.ai_update.is_some(),
            HookKind::TileCollision => self.tile_collision.is_some(),
            HookKind::Transformed => self.transformed.is_some(),
            HookKind::CheckReplace => self.check_replace.is_some(),
        }
    }

    pub fn is_empty(&self) -> bool {
        !HookKind::ALL.iter().any(|kind| self.is_bound(*kind))
    }

    // Binding

    pub fn on_spawn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<()> + Send + Sync + 'static,
    {
        self.spawn = Some(Arc::new(f));
        self
    }

    pub fn on_check_spawn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, PlayerSlot, i32, i32) -> ScriptResult<bool>
            + Send
            + Sync
            + 'static,
    {
        self.check_spawn = Some(Arc::new(f));
        self
    }

    pub fn on_collision<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc, PlayerSlot) -> ScriptResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.collision = Some(Arc::new(f));
        self
    }

    pub fn on_killed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<()> + Send + Sync + 'static,
    {
        self.killed = Some(Arc::new(f));
        self
    }

    pub fn on_strike<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc, Strike) -> ScriptResult<bool>
            + Send
            + Sync
            + 'static,
    {
        self.strike = Some(Arc::new(f));
        self
    }

    pub fn on_ai_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<bool> + Send + Sync + 'static,
    {
        self.ai_update = Some(Arc::new(f));
        self
    }

    pub fn on_tile_collision<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc, &[TilePoint]) -> ScriptResult<()>
            + Send
            + Sync
            + 'static,
    {
        self.tile_collision = Some(Arc::new(f));
        self
    }

    pub fn on_transformed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, &CustomNpc) -> ScriptResult<()> + Send + Sync + 'static,
    {
        self.transformed = Some(Arc::new(f));
        self
    }

    pub fn on_check_replace<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn GameWorld, NpcSlot) -> ScriptResult<f64> + Send + Sync + 'static,
    {
        self.check_replace = Some(Arc::new(f));
        self
    }

    // Dispatch. Unbound hooks return the neutral value without taking the lock.

    pub fn fire_spawn(&self, world: &mut dyn GameWorld, npc: &CustomNpc) {
        if let Some(hook) = &self.spawn {
            invoke(HookKind::Spawn, &npc.definition.name, (), || hook(world, npc));
        }
    }

    /// Unbound approves; a fault declines
    pub fn fire_check_spawn(
        &self,
        owner: &str,
        world: &mut dyn GameWorld,
        player: PlayerSlot,
        x: i32,
        y: i32,
    ) -> bool {
        match &self.check_spawn {
            Some(hook) => invoke(HookKind::CheckSpawn, owner, false, || hook(world, player, x, y)),
            None => true,
        }
    }

    pub fn fire_collision(&self, world: &mut dyn GameWorld, npc: &CustomNpc, player: PlayerSlot) {
        if let Some(hook) = &self.collision {
            invoke(HookKind::Collision, &npc.definition.name, (), || {
                hook(world, npc, player)
            });
        }
    }

    pub fn fire_killed(&self, world: &mut dyn GameWorld, npc: &CustomNpc) {
        if let Some(hook) = &self.killed {
            invoke(HookKind::Killed, &npc.definition.name, (), || hook(world, npc));
        }
    }

    /// Returns whether the script handled the strike
    pub fn fire_strike(&self, world: &mut dyn GameWorld, npc: &CustomNpc, strike: Strike) -> bool {
        match &self.strike {
            Some(hook) => invoke(HookKind::Strike, &npc.definition.name, false, || {
                hook(world, npc, strike)
            }),
            None => false,
        }
    }

    /// Returns whether the script replaced the vanilla AI for this update
    pub fn fire_ai_update(&self, world: &mut dyn GameWorld, npc: &CustomNpc) -> bool {
        match &self.ai_update {
            Some(hook) => invoke(HookKind::AiUpdate, &npc.definition.name, false, || {
                hook(world, npc)
            }),
            None => false,
        }
    }

    pub fn has_tile_collision(&self) -> bool {
        self.tile_collision.is_some()
    }

    pub fn fire_tile_collision(
        &self,
        world: &mut dyn GameWorld,
        npc: &CustomNpc,
        tiles: &[TilePoint],
    ) {
        if let Some(hook) = &self.tile_collision {
            invoke(HookKind::TileCollision, &npc.definition.name, (), || {
                hook(world, npc, tiles)
            });
        }
    }

    pub fn fire_transformed(&self, world: &mut dyn GameWorld, npc: &CustomNpc) {
        if let Some(hook) = &self.transformed {
            invoke(HookKind::Transformed, &npc.definition.name, (), || {
                hook(world, npc)
            });
        }
    }

    /// Replacement chance for this entity; falls back to `chance`
    pub fn fire_check_replace(
        &self,
        owner: &str,
        world: &mut dyn GameWorld,
        slot: NpcSlot,
        chance: f64,
    ) -> f64 {
        match &self.check_replace {
            Some(hook) => invoke(HookKind::CheckReplace, owner, chance, || {
                let value = hook(world, slot)?;
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(ScriptError::Type {
                        hook: HookKind::CheckReplace.as_str(),
                        message: format!("non-finite chance {value}"),
                    })
                }
            }),
            None => chance,
        }
    }
}

static SCRIPT_LOCK: Mutex<()> = const_mutex(());

/// Run one hook call under the script lock, isolating faults.
pub fn invoke<T>(
    kind: HookKind,
    owner: &str,
    neutral: T,
    call: impl FnOnce() -> ScriptResult<T>,
) -> T {
    let _guard = SCRIPT_LOCK.lock();
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            error!(hook = %kind, definition = owner, error = %err, "Script hook failed");
            neutral
        }
        Err(payload) => {
            let err = ScriptError::Runtime(panic_message(payload.as_ref()));
            error!(hook = %kind, definition = owner, error = %err, "Script hook panicked");
            neutral
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Hook tables keyed by script path.
#[derive(Debug, Default, Clone)]
pub struct ScriptLibrary {
    scripts: HashMap<String, HookTable>,
}

impl ScriptLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, script_path: impl Into<String>, hooks: HookTable) -> &mut Self {
        self.scripts.insert(script_path.into(), hooks);
        self
    }

    pub fn get(&self, script_path: &str) -> Option<&HookTable> {
        self.scripts.get(script_path)
    }

    pub fn contains(&self, script_path: &str) -> bool {
        self.scripts.contains_key(script_path)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Bind the definition's script module. Returns false when the definition
    /// names a script the library does not provide.
    pub fn link(&self, definition: &NpcDefinition) -> bool {
        let Some(path) = definition.script_path.as_deref() else {
            return true;
        };
        match self.scripts.get(path) {
            Some(hooks) => {
                let bound = definition.link_hooks(hooks.clone());
                debug!(definition = %definition.name, script = path, bound, "Linked script");
                true
            }
            None => {
                warn!(definition = %definition.name, script = path, "Script module not found");
                false
            }
        }
    }
}
