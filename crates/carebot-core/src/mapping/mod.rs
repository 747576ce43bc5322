//! IAM user ↔ FHIR patient / practitioner mappings.

pub mod identity;
pub mod repository;
pub mod service;
