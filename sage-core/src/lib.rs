//! sage-core - Adaptive assessment kernel
//!
//! This crate decides which question a learner sees next, how each response
//! moves their latent ability estimate (IRT 3PL with grid EAP), and how it
//! moves their per-knowledge-component mastery posterior (Bayesian Knowledge
//! Tracing). A deterministic static mode serves items in authored order as
//! the experimental control. Persistence is abstracted behind the
//! [`store::Repository`] trait; everything else is pure computation.

pub mod bkt;
pub mod engine;
pub mod error;
pub mod irt;
pub mod selector;
pub mod store;
pub mod types;

pub use engine::{
    AnswerOutcome, KcUpdateSummary, NextOutcome, NextQuestion, SelectionMeta, SessionComplete,
    SessionEngine, ThetaSummary,
};
pub use error::{EngineError, Result};
pub use store::{LoadedSession, MemoryRepository, Repository, SessionUpdate};
pub use types::*;
