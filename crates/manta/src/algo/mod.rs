pub mod atlas;

use crate::graph::Node;

/// Radius callback used by overlap prevention.
pub type RadiusFn = fn(&Node) -> f64;

/// Tunable settings for the ForceAtlas2-style step.
///
/// Construct with `AtlasSettings::default()` and override fields via struct-update syntax;
/// the defaults are the documented baseline, so "merge with defaults" is plain struct
/// construction. Settings are immutable during a tick and persist across ticks until the
/// caller replaces them.
#[derive(Debug, Clone)]
pub struct AtlasSettings {
    /// Pull-to-center strength.
    pub gravity: f64,
    /// Gravity multiplier.
    pub scaling_ratio: f64,
    /// Exponent applied to the edge weight in attraction.
    pub edge_weight_influence: f64,
    /// Scale repulsion by node degree so high-degree hubs spread apart.
    pub dissuade_hubs: bool,
    /// Run the pairwise overlap pass. Quadratic; intended for small visible node counts.
    pub prevent_overlap: bool,
    /// Barnes-Hut accuracy threshold. Larger is faster and less accurate; 0 degenerates to
    /// exact pairwise repulsion.
    pub theta: f64,
    /// Numerator of the `strength / distance²` repulsion term.
    pub repulsion_strength: f64,
    /// Extra per-tick decay applied on top of the `1 - alpha` cooling factor.
    pub cooling_rate: f64,
    /// Viewport width. Gravity pulls toward `(width / 2, height / 2)` and positions are
    /// clamped into the viewport after integration. Non-finite or non-positive dimensions
    /// fall back to 800×600.
    pub width: f64,
    /// Viewport height.
    pub height: f64,
    /// Cap on the per-tick velocity magnitude; the vector is rescaled, preserving direction.
    pub max_velocity: f64,
    /// Node radius used only by overlap prevention.
    pub node_radius: RadiusFn,
    /// Seed for the sanitization jitter. The upstream behavior relies on ambient
    /// `Math.random`-style entropy; here the randomness is explicit and reproducible.
    pub random_seed: u64,
}

impl Default for AtlasSettings {
    fn default() -> Self {
        Self {
            gravity: 0.05,
            scaling_ratio: 1.0,
            edge_weight_influence: 1.0,
            dissuade_hubs: false,
            prevent_overlap: false,
            theta: 0.5,
            repulsion_strength: 1000.0,
            cooling_rate: 0.9,
            width: 800.0,
            height: 600.0,
            max_velocity: 10.0,
            node_radius: default_node_radius,
            random_seed: 0,
        }
    }
}

/// Default radius: grows with the square root of degree so well-connected nodes claim more
/// space from the overlap pass.
fn default_node_radius(node: &Node) -> f64 {
    8.0 + 2.0 * node.degree.max(1.0).sqrt()
}
