//! Test fixtures shared by the integration suites.
//!
//! The [`tree`] builders assemble compilation units the way an external
//! parser would, with zero spans. [`platform`] assembles a miniature
//! `java.*` class path with quill's own class-file writer, so binder and
//! lowering tests run hermetically against real class bytes.

pub mod platform;
pub mod tree;
