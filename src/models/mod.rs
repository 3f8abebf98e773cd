//! Core data models for the Riak client.
//!
//! These types describe what travels over the wire: objects with their
//! links, indexes and metadata, bucket property documents, quorum values and
//! map/reduce jobs. They carry no connection state.

pub mod bucket;
pub mod index;
pub mod link;
pub mod mapreduce;
pub mod object;
pub mod quorum;
