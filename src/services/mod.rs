//! The client façade: connection handle, buckets, object operations and
//! map/reduce, plus the response populator they share.

pub mod bucket;
pub mod client;
pub mod mapreduce;
pub mod objects;
pub mod populate;
