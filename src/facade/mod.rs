pub mod options;
pub mod store;

pub use options::StoreOptions;
pub use store::Store;
