//! Client-side resume analysis engine.
//!
//! Four layers, leaf to root: the capability gateway (the sole seam to
//! the host's auth/fs/ai/kv services), the document rasterizer (first
//! PDF page → PNG preview), the remote-operation cache (typed query /
//! mutation catalog with de-duplication and tag invalidation), and the
//! analysis pipeline (upload → convert → upload → persist → analyze →
//! persist). The binary in `main.rs` is a thin CLI driver over these.

pub mod capability;
pub mod config;
pub mod host;
pub mod models;
pub mod ops;
pub mod pipeline;
pub mod rasterize;

#[cfg(test)]
pub(crate) mod testing;
