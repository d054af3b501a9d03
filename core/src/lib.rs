//! Filesystem-backed item store for Folio writing projects.
//!
//! See [`storage`] for the on-disk layout and the available operations.

pub mod storage;
