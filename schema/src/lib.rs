// Battle Engine Schema - catalog definitions
// Types in this crate describe static game data (moves, items, species)
// and are shared by the engine and anything that authors catalog files.

pub use battle_data::*;
pub use item_data::*;
pub use move_data::*;
pub use pokemon_types::*;
pub use species_data::*;

pub mod battle_data;
pub mod item_data;
pub mod move_data;
pub mod pokemon_types;
pub mod species_data;
