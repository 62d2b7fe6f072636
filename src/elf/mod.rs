//! ELF64 little-endian reading and in-place rewriting.
//!
//! [`fmap`] provides read-only, page-aligned access used for classifying
//! an input (archive vs. object, which section types it carries) without
//! taking a write lock on it. [`rewrite`] provides the read-write whole-
//! file mapping and the eight rewrite primitives that mutate a copy of an
//! input file in place.

pub mod fmap;
pub mod rewrite;

pub use fmap::{ArchiveMember, ElfView, Fmap};
