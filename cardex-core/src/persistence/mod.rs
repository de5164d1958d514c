mod store;

pub use store::{StoreFile, StorePaths};
