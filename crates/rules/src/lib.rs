//! Passage rules engine -- regulation-scoped constraint checks over
//! product documents.
//!
//! A [`RuleBook`] maps regulation names to lists of declarative rules.
//! [`evaluate`] runs a document through the rules of the requested
//! regulations and classifies every finding into violations, warnings,
//! or recommendations. The built-in book covers the four default
//! regulations; external books load from JSON.

pub mod book;
pub mod eval;
pub mod model;
pub mod path;

pub use book::RuleBook;
pub use eval::evaluate;
pub use model::{PathList, Rule, RuleCondition, ValueType};
