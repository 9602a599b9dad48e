//! Orchestration layer for Clinidoc.
//!
//! Composes the domain state machine, the persistence abstraction, and the
//! FHIR mappers behind the operations thin API handlers call. Services are
//! constructed with an injected `ChartStore`; there is no global registry.
//!
//! # Example
//!
//! ```ignore
//! use clinidoc_service::{ClinidocServices, ServiceConfig};
//! use clinidoc_storage::create_memory_store;
//!
//! let services = ClinidocServices::new(create_memory_store(), ServiceConfig::default());
//! let patient = services.patients.register("Ada", "Lovelace", Default::default()).await?;
//! ```

pub mod bundles;
pub mod config;
pub mod encounters;
pub mod episodes;
pub mod error;
pub mod gateway;
pub mod patients;
pub mod telemetry;

use clinidoc_storage::DynChartStore;

pub use bundles::BundleProcessor;
pub use config::ServiceConfig;
pub use encounters::{EncounterService, EncounterStatistics};
pub use episodes::EpisodeService;
pub use error::{Result, ServiceError};
pub use patients::{PatientDetails, PatientService};
pub use telemetry::init_tracing;

/// The full service set wired against one store.
pub struct ClinidocServices {
    pub patients: PatientService,
    pub episodes: EpisodeService,
    pub encounters: EncounterService,
    pub bundles: BundleProcessor,
}

impl ClinidocServices {
    pub fn new(store: DynChartStore, config: ServiceConfig) -> Self {
        Self {
            patients: PatientService::new(store.clone()),
            episodes: EpisodeService::new(store.clone()),
            encounters: EncounterService::new(store.clone(), config.clone()),
            bundles: BundleProcessor::new(store, config.transaction_timeout()),
        }
    }
}
