//! Ranked-list fusion. [`retriever`](crate::retriever) is the module that
//! actually runs dense + lexical search over chunk ids; this module holds
//! only the fusion math, kept independent so it can be unit tested on
//! plain integer ids.

pub mod rrf;

pub use rrf::{RrfConfig, reciprocal_rank_fusion, weighted_rrf};
