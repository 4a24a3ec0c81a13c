//! Sample scientific articles, model their topics and summarise them with
//! managed cloud services.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod join;
pub mod logging;
pub mod retry;
pub mod sampler;
pub mod select;
pub mod state;
pub mod storage;
pub mod summarize;
pub mod teardown;
pub mod topics;

pub use error::{DigestError, Result};
