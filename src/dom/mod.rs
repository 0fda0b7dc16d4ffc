//! Document snapshots
//!
//! The live page is read through snapshots serialized by an injected script:
//! - ElementNode: one serialized node, as produced by the script
//! - DomTree: the flattened snapshot with parent links and document-order ids
//! - ControlMap: disclosure controls matched in a snapshot

pub mod controls;
pub mod element;
pub mod tree;

pub use controls::{Control, ControlMap};
pub use element::{BoxStyle, ElementNode, NodeRef};
pub use tree::{DomNode, DomTree, NodeId};

/// Script that stamps and serializes the subtree under a container reference
pub const SNAPSHOT_SCRIPT: &str = include_str!("snapshot.js");
