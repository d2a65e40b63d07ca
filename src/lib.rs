//! # tdt-stream
//!
//! Streaming topic detection and tracking over short social-media posts.
//!
//! Posts enter a queue; a consumer drains it on every tick, turns posts into
//! term vectors, clusters them online, and watches term weights over time
//! for bursts. Clusters that break out are appended to a timeline of
//! developments.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────┐   ┌──────────────────────────────┐   ┌──────────┐
//! │  Producer  │──▶│  Queue  │──▶│ Consumer                     │──▶│ Timeline │
//! │ (replay)   │   │         │   │  filter → documents          │   │  nodes   │
//! └────────────┘   └─────────┘   │  stores + clustering         │   └──────────┘
//!                                │  bursts + admission          │
//!                                └──────────────────────────────┘
//! ```
//!
//! The algorithms themselves (stores, burst detection, clustering,
//! admission, timeline) live in the runtime-free `tdt-core` crate. This
//! crate adds the asynchronous engine around them.
//!
//! ## Quick Start
//!
//! ```bash
//! tdt check-config --config ./config/tdt.toml
//! tdt replay match.jsonl --speed 60
//! tdt replay match.jsonl --json > timeline.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Raw stream items |
//! | [`filter`] | Item validity filter |
//! | [`damping`] | Repost damping |
//! | [`queue`] | Asynchronous FIFO between producer and consumer |
//! | [`clock`] | Wall-clock and stream-driven time |
//! | [`consumer`] | The consumer engine and its tick strategies |
//! | [`report`] | Live topic reports on stderr |
//! | [`replay`] | JSONL replay of recorded streams |
//! | [`logging`] | `tracing` subscriber setup |

pub mod clock;
pub mod config;
pub mod consumer;
pub mod damping;
pub mod filter;
pub mod logging;
pub mod models;
pub mod queue;
pub mod replay;
pub mod report;
