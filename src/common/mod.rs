// Common definitions shared by the catalog, transaction and cluster layers

pub mod types;
