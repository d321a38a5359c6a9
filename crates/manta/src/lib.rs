#![forbid(unsafe_code)]

//! Headless force-directed graph layout (ForceAtlas2-style, Barnes-Hut accelerated).
//!
//! `manta` positions similarity graphs in a 2D viewport: edge-based spring attraction,
//! quadtree-approximated repulsion, center gravity, optional hub dissuasion and overlap
//! correction, integrated with caller-driven cooling. The caller owns the node/edge set,
//! the animation loop and the renderer; each [`step`] mutates node positions and velocities
//! in place and nothing else.

pub mod algo;
pub mod error;
pub mod graph;

pub use algo::atlas::{initialize_elements, step};
pub use algo::{AtlasSettings, RadiusFn};
pub use error::{Error, Result};
pub use graph::{Edge, Graph, Node};
