//! Resource type ids used for dispatch

/// String table (STBL)
pub const STRING_TABLE: u32 = 0x220557DA;
/// Binary SimData companion to tuning
pub const SIMDATA: u32 = 0x545AC67A;

/// Generic tuning
pub const TUNING: u32 = 0x03B33DDF;
/// Trait tuning
pub const TRAIT: u32 = 0xCB5FDDC7;
/// Buff tuning
pub const BUFF: u32 = 0x6017E896;
/// Snippet tuning
pub const SNIPPET: u32 = 0x7DF2169C;
/// Interaction tuning
pub const INTERACTION: u32 = 0xE882D22F;
/// Object tuning
pub const OBJECT: u32 = 0xB61DE6B4;
/// Loot tuning
pub const LOOT: u32 = 0x0C772E27;

const TUNING_TYPES: &[u32] = &[TUNING, TRAIT, BUFF, SNIPPET, INTERACTION, OBJECT, LOOT];

/// Whether `resource_type` is a known tuning (XML) type
#[must_use]
pub fn is_tuning_type(resource_type: u32) -> bool {
    TUNING_TYPES.contains(&resource_type)
}
