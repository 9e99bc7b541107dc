pub mod bucket;
pub mod client;
pub mod cmd;
pub mod directory;
pub mod error;
pub mod partitioning;
pub mod server;
pub mod storage_engine;
pub mod telemetry;
pub mod test_utils;
pub mod utils;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;
