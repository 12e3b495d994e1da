#![recursion_limit = "256"]

//! Batch solubility prediction for molecules given as SMILES.
//!
//! Layers, outermost first: `cli`, `application`, `domain`, `data`,
//! `ml` (Burn models) and `infra` (model artifacts, CSV output, logging).

pub mod cli;
pub mod application;
pub mod domain;
pub mod data;
pub mod ml;
pub mod infra;
