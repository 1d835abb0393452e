//! Integration tests for the `DataStore` contract over `MemoryDataStore`.

mod fixtures;
mod lifecycle;
mod operations;
