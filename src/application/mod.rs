//! Application services: the cache-aside search path and the index
//! synchronizer, plus the adapter traits they drive.

pub mod error;
pub mod pagination;
pub mod repos;
pub mod search;
pub mod sync;
