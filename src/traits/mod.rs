pub mod store;

pub use store::ProvenanceStore;
