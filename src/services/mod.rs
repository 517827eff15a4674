//! Service layer for the directory application.
//!
//! This module contains the business logic for:
//! - Registry page extraction (universities, departments, scholar rosters)
//! - Registry scraping through the browser (`RegistryScraper`)
//! - Scholar vector maintenance (`VectorMaintenanceService`)
//! - Research-area catalog and user interests
//! - Recommendations (`RecommendationEngine`)

mod departments;
mod interests;
mod recommendations;
mod registry;
mod research_areas;
mod scholars;
mod throttle;
mod universities;
mod vectors;

pub use departments::{clean_department_name, extract_departments};
pub use interests::InterestService;
pub use recommendations::{RecalcOutcome, RecommendationEngine};
pub use registry::{RegistryScraper, RegistrySource};
pub use research_areas::{AreaCount, ResearchAreaCatalog};
pub use scholars::{RosterParser, extract_email};
pub use throttle::{Throttle, jittered_delay};
pub use universities::extract_universities;
pub use vectors::{VectorMaintenanceService, scholar_text};
