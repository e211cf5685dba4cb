//! Fundamental analysis pipeline for Brazilian equities: collects CVM
//! DFP filing archives, parses them into typed statement records,
//! computes financial indicators with decimal arithmetic, fetches quote
//! bars from an external terminal bridge, and serves results through a
//! read-only dashboard API.

pub mod collector;
pub mod dashboard;
pub mod error;
pub mod indicators;
pub mod models;
pub mod parser;
pub mod processor;
pub mod quotes;
pub mod storage;
