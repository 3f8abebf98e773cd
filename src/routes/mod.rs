//! URL construction for the Riak HTTP interface.

pub mod urls;
