//! A networked MapReduce engine: one coordinator distributes map and
//! reduce tasks to a pool of worker peers, which exchange intermediate
//! shards directly with each other over HTTP.

pub mod closure_mr;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod fnv;
pub mod http_server;
pub mod map_exec;
pub mod mapreduce;
pub mod naming;
pub mod pair;
pub mod partition;
pub mod reduce_exec;
pub mod rpc;
pub mod shard_store;
pub mod worker;
