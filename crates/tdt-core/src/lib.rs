//! # tdt-core
//!
//! Pure, synchronous building blocks of the streaming topic detection and
//! tracking engine: sparse term vectors, documents, time-bucketed nutrition
//! stores, the burst detector, incremental clustering, the cluster admission
//! filter, and the timeline.
//!
//! This crate contains no tokio, filesystem I/O, or logging. The
//! asynchronous consumer that wires these pieces together lives in the
//! `tdt-stream` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`error`] | Error kinds shared by every component |
//! | [`vector`] | Sparse term-weight vectors and similarity |
//! | [`document`] | Documents and the tokenizer collaborator |
//! | [`store`] | Time-bucketed nutrition stores |
//! | [`burst`] | Burst (emergence) detection |
//! | [`spike`] | Volume spike detection |
//! | [`cluster`] | Incremental temporal clustering |
//! | [`admission`] | Cluster admission filter |
//! | [`timeline`] | Timeline of topical nodes |
//! | [`window`] | Windowed aggregation, partitioning and dormancy |

pub mod admission;
pub mod burst;
pub mod cluster;
pub mod document;
pub mod error;
pub mod spike;
pub mod store;
pub mod timeline;
pub mod vector;
pub mod window;

pub use error::{Result, TdtError};
