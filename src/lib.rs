//! Custom NPC Core Library
//!
//! Data-driven custom NPCs layered over a host game engine:
//! - Definition model, validation and JSON loading (with category includes)
//! - Definition registry with atomic hot-reload swaps
//! - Scripted hooks dispatched through typed slots under one lock
//! - Attribute application onto host NPC slots
//! - Spawn-site search and per-tick spawn director
//! - Loot economy (extra drops and coin override)
//! - Admin commands and spawn configuration
//!
//! The host implements [`world::GameWorld`]; [`sandbox::SandboxWorld`] is an
//! in-memory host for tests and the `npc-sim` demo.

pub mod attributes;
pub mod commands;
pub mod config;
pub mod constants;
pub mod definition;
pub mod director;
pub mod error;
pub mod hotreload;
pub mod loader;
pub mod logging;
pub mod loot;
pub mod registry;
pub mod sandbox;
pub mod scripting;
pub mod spawning;
pub mod world;

pub use config::SpawnConfig;
pub use definition::NpcDefinition;
pub use director::{CustomNpc, SpawnDirector, TickReport};
pub use error::{NpcError, ScriptError, ScriptResult};
pub use loader::DefinitionLoader;
pub use registry::{DefinitionRegistry, RegistryHandle};
pub use scripting::{HookKind, HookTable, ScriptLibrary};
pub use world::{GameWorld, TileMap};
