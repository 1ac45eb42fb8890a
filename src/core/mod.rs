//! Core business logic, independent of any delivery surface.
//!
//! The energy pool manager owns each business's monthly budget; the activation
//! gate spends from it when a mission goes live.

/// Mission activation gate
pub mod activation;
/// Business accounts
pub mod business;
/// Integration connection flags
pub mod connections;
/// Calendar-month cycle windows
pub mod cycle;
/// Energy pool manager
pub mod energy;
/// Monthly reset sweep
pub mod reset;
