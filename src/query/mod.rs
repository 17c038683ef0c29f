//! Query execution for cfdi-lab.
//!
//! Isolates statement dispatch and table previews from the session
//! controller so they can be tested on their own.

pub mod executor;

pub use executor::{
    preview_statement, quote_identifier, QueryExecutor, OFFLINE_MESSAGE, PREVIEW_LIMIT,
};
