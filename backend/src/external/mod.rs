//! External service integrations

pub mod detector;
pub mod firestore;
pub mod store;

pub use detector::{DetectionOutput, DetectorClient, ObjectDetector};
pub use firestore::FirestoreStore;
pub use store::{DocumentQuery, DocumentStore, MemoryStore, StoreError};
