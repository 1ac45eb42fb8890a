//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod business;
pub mod energy_ledger;
pub mod energy_pool;
pub mod integration_connection;
pub mod mission_activation;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use business::{Column as BusinessColumn, Entity as Business, Model as BusinessModel};
pub use energy_ledger::{
    Column as EnergyLedgerColumn, Entity as EnergyLedger, Model as EnergyLedgerModel,
};
pub use energy_pool::{Column as EnergyPoolColumn, Entity as EnergyPool, Model as EnergyPoolModel};
pub use integration_connection::{
    Column as IntegrationConnectionColumn, Entity as IntegrationConnection,
    Model as IntegrationConnectionModel,
};
pub use mission_activation::{
    Column as MissionActivationColumn, Entity as MissionActivation,
    Model as MissionActivationModel,
};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
