// =============================================================================
// API Module — HTTP control surface
// =============================================================================

pub mod rest;
