pub mod ai;
pub mod calculators;
pub mod catch;
pub mod commands;
pub mod effects;
pub mod engine;
pub mod events;
pub mod state;
pub mod stats;
pub mod switching;

#[cfg(test)]
pub(crate) mod tests;
