// handlers/mod.rs - Two-tier handler layout
//
// Public (no auth) → Protected (session JWT, every query scoped to the caller's BTRs)

pub mod public;
pub mod protected;
