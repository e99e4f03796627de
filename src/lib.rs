//! Parity testing for two implementations of the same HTTP API.
//!
//! A suite file describes requests to send to backend A and backend B. Both
//! JSON responses are normalized and diffed structurally, and every
//! difference is reported with its dot-delimited path.
#![allow(clippy::result_large_err)]

pub mod asserter;
pub mod diff;
pub mod normalize;
pub mod outputter;
pub mod parser;
pub mod path;
pub mod report;
pub mod runner;
pub mod validator;
