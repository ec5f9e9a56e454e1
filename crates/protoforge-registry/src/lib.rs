// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Module and version storage for the Protoforge schema registry.
//!
//! Stores versioned protobuf modules (a named set of `.proto` files plus
//! their declared dependencies) and serves them to the compile
//! orchestrator through a narrow lookup interface.
//!
//! # Features
//!
//! - **Versioned storage**: Publish and retrieve module versions by name
//! - **Content hashing**: Every version carries a digest of its file set
//! - **Persistence**: Optional JSON snapshot storage for module history
//! - **Thread-safe facade**: `ModuleRegistryApi` for concurrent access
//!
//! # Architecture
//!
//! ```text
//! Orchestrator / HTTP layer
//!        |
//!        v
//!   ModuleRegistryApi (Arc<RwLock<ModuleRegistry>>)
//!        |
//!        v
//!   FilePersistence (optional JSON snapshots)
//! ```

pub mod api;
pub mod persistence;
pub mod registry;

pub use api::ModuleRegistryApi;
pub use persistence::FilePersistence;
pub use registry::{ModuleRegistry, ProtoFile, RegistryError, VersionEntry};
