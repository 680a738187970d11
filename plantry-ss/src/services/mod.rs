//! Collaborator services for the scan workflow
//!
//! Each collaborator is a narrow trait the controller depends on, with a
//! production implementation here and in-memory fakes in the tests. The
//! three lookup-shaped operations (barcode lookup, packet extraction,
//! catalog match) fail independently and are never retried automatically.

pub mod barcode_lookup;
pub mod catalog_matcher;
pub mod extraction_client;
pub mod image_store;
pub mod stash_persister;

pub use barcode_lookup::{BarcodeLookup, DbBarcodeLookup};
pub use catalog_matcher::{CatalogMatcher, DbCatalogMatcher};
pub use extraction_client::{ExtractionError, PacketExtractionClient, PacketExtractor};
pub use image_store::{DiskImageStore, ImageStore};
pub use stash_persister::{DbStashPersister, StashPersister};
