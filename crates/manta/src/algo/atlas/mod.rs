//! ForceAtlas2-style simulation step.
//!
//! One tick: recompute degrees, sanitize state, then apply edge attraction, center gravity,
//! Barnes-Hut repulsion and (optionally) pairwise overlap correction into the node
//! velocities, then integrate with cooling and clamping. The caller owns the animation loop
//! and decides when to stop ticking; the step itself is synchronous and mutates the graph in
//! place.

use tracing::{trace, warn};

use crate::algo::AtlasSettings;
use crate::error::Result;
use crate::graph::Graph;

mod quadtree;

use quadtree::QuadTree;

/// Fallback viewport for non-finite or non-positive dimensions.
const DEFAULT_WIDTH: f64 = 800.0;
const DEFAULT_HEIGHT: f64 = 600.0;

/// Half-extent of the jitter square around the viewport center used when a position must be
/// substituted. Non-zero so that batches of fresh nodes do not start perfectly coincident.
const JITTER_RADIUS: f64 = 10.0;

/// Run one simulation tick.
///
/// `alpha` is the caller-driven cooling coefficient, typically decaying from 1 toward 0
/// across ticks. Returns an error — before any node state is touched — when the graph fails
/// validation; numerical degeneracies during the tick are absorbed locally instead.
pub fn step(graph: &mut Graph, alpha: f64, settings: &AtlasSettings) -> Result<()> {
    graph.validate()?;
    if graph.nodes.is_empty() {
        return Ok(());
    }

    let (width, height) = viewport(settings);

    recompute_degrees(graph);
    sanitize(graph, width, height, settings.random_seed);

    apply_attraction(graph, width, height, settings);
    apply_gravity(graph, width, height, settings);
    apply_repulsion(graph, settings);
    if settings.prevent_overlap {
        apply_overlap_prevention(graph, settings);
    }
    integrate(graph, alpha, width, height, settings);

    Ok(())
}

/// One-time/per-reset sanitization for a freshly introduced node/edge set: nodes without a
/// finite position get a jittered near-center default and zero velocity, non-finite edge
/// weights become 1.
pub fn initialize_elements(graph: &mut Graph, settings: &AtlasSettings) {
    let (width, height) = viewport(settings);
    sanitize(graph, width, height, settings.random_seed);
}

fn viewport(settings: &AtlasSettings) -> (f64, f64) {
    let width = if settings.width.is_finite() && settings.width > 0.0 {
        settings.width
    } else {
        DEFAULT_WIDTH
    };
    let height = if settings.height.is_finite() && settings.height > 0.0 {
        settings.height
    } else {
        DEFAULT_HEIGHT
    };
    (width, height)
}

/// Unit direction and length of a separation vector, or `None` when the points coincide
/// (or the input is not a number). Every force pass routes its zero-distance policy through
/// here: no defined direction means no force, never a division by zero.
pub(crate) fn safe_direction(dx: f64, dy: f64) -> Option<(f64, f64, f64)> {
    let dist_sq = dx * dx + dy * dy;
    if dist_sq > 0.0 {
        let dist = dist_sq.sqrt();
        Some((dx / dist, dy / dist, dist))
    } else {
        None
    }
}

/// Reset every degree to the self-similarity floor of 1, then add each edge's weight to both
/// endpoints. Runs after validation, so endpoint indices are known to be in range.
fn recompute_degrees(graph: &mut Graph) {
    for node in &mut graph.nodes {
        node.degree = 1.0;
    }
    for edge in &graph.edges {
        let weight = if edge.weight.is_finite() {
            edge.weight
        } else {
            1.0
        };
        graph.nodes[edge.source].degree += weight;
        graph.nodes[edge.target].degree += weight;
    }
}

fn sanitize(graph: &mut Graph, width: f64, height: f64, seed: u64) {
    let mut rng = XorShift64Star::new(seed);
    let (cx, cy) = (width / 2.0, height / 2.0);
    for node in &mut graph.nodes {
        if !(node.x.is_finite() && node.y.is_finite()) {
            node.x = cx + rng.next_f64_signed() * JITTER_RADIUS;
            node.y = cy + rng.next_f64_signed() * JITTER_RADIUS;
            node.vx = 0.0;
            node.vy = 0.0;
        }
        if !(node.vx.is_finite() && node.vy.is_finite()) {
            node.vx = 0.0;
            node.vy = 0.0;
        }
    }
    for edge in &mut graph.edges {
        if !edge.weight.is_finite() {
            edge.weight = 1.0;
        }
    }
}

/// Spring attraction along every edge: `distance² / (k · weight^influence)` with
/// `k = sqrt(width · height / node_count)`, pulling both endpoints together.
fn apply_attraction(graph: &mut Graph, width: f64, height: f64, settings: &AtlasSettings) {
    let k = (width * height / graph.nodes.len() as f64).sqrt();
    for (i, edge) in graph.edges.iter().enumerate() {
        let source = &graph.nodes[edge.source];
        let target = &graph.nodes[edge.target];
        let Some((ux, uy, dist)) = safe_direction(target.x - source.x, target.y - source.y)
        else {
            trace!(edge = i, "coincident endpoints, skipping attraction");
            continue;
        };
        let magnitude = dist * dist / (k * edge.weight.powf(settings.edge_weight_influence));
        if !magnitude.is_finite() {
            warn!(
                edge = i,
                weight = edge.weight,
                "non-finite attraction contribution dropped"
            );
            continue;
        }

        let s = &mut graph.nodes[edge.source];
        s.vx += ux * magnitude;
        s.vy += uy * magnitude;
        let t = &mut graph.nodes[edge.target];
        t.vx -= ux * magnitude;
        t.vy -= uy * magnitude;
    }
}

/// Pull every node toward the viewport center with `gravity · mass · scaling_ratio`.
fn apply_gravity(graph: &mut Graph, width: f64, height: f64, settings: &AtlasSettings) {
    let (cx, cy) = (width / 2.0, height / 2.0);
    for node in &mut graph.nodes {
        let Some((ux, uy, _)) = safe_direction(cx - node.x, cy - node.y) else {
            continue;
        };
        let magnitude = settings.gravity * node.effective_mass() * settings.scaling_ratio;
        if !magnitude.is_finite() {
            warn!(id = node.id.as_str(), "non-finite gravity contribution dropped");
            continue;
        }
        node.vx += ux * magnitude;
        node.vy += uy * magnitude;
    }
}

/// Rebuild the spatial index from the current positions and accumulate approximate repulsion
/// per node; hubs repel harder when dissuasion is on.
fn apply_repulsion(graph: &mut Graph, settings: &AtlasSettings) {
    let tree = QuadTree::build(&graph.nodes);
    for (i, node) in graph.nodes.iter_mut().enumerate() {
        let (fx, fy) = tree.repulsion(i, node.x, node.y, settings.theta, settings.repulsion_strength);
        let scale = if settings.dissuade_hubs { node.degree } else { 1.0 };
        node.vx += fx * scale;
        node.vy += fy * scale;
    }
}

/// Pairwise position correction: any two nodes closer than the sum of their radii are pushed
/// apart along the connecting axis, half the overlap each. Quadratic by design; callers keep
/// it off above small node counts.
fn apply_overlap_prevention(graph: &mut Graph, settings: &AtlasSettings) {
    let radius = settings.node_radius;
    for i in 0..graph.nodes.len() {
        for j in (i + 1)..graph.nodes.len() {
            let (left, right) = graph.nodes.split_at_mut(j);
            let a = &mut left[i];
            let b = &mut right[0];
            let Some((ux, uy, dist)) = safe_direction(b.x - a.x, b.y - a.y) else {
                continue;
            };
            let min_sep = radius(a) + radius(b);
            if dist >= min_sep {
                continue;
            }
            let push = (min_sep - dist) / 2.0;
            a.x -= ux * push;
            a.y -= uy * push;
            b.x += ux * push;
            b.y += uy * push;
        }
    }
}

/// Cool, clamp and apply the accumulated velocities, then clamp positions into the viewport.
fn integrate(graph: &mut Graph, alpha: f64, width: f64, height: f64, settings: &AtlasSettings) {
    let damping = ((1.0 - alpha) * settings.cooling_rate).clamp(0.0, 1.0);
    for node in &mut graph.nodes {
        node.vx *= damping;
        node.vy *= damping;

        let speed = (node.vx * node.vx + node.vy * node.vy).sqrt();
        if speed > settings.max_velocity {
            let scale = settings.max_velocity / speed;
            node.vx *= scale;
            node.vy *= scale;
        }

        node.x = (node.x + node.vx).clamp(0.0, width);
        node.y = (node.y + node.vy).clamp(0.0, height);
    }
}

#[derive(Debug, Clone)]
struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D_u64)
    }

    /// Map to (-1, 1) with 53 bits of precision.
    fn next_f64_signed(&mut self) -> f64 {
        let u = self.next_u64() >> 11;
        let v = (u as f64) / ((1u64 << 53) as f64);
        (v * 2.0) - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_deterministic_and_stays_in_the_signed_unit_range() {
        let mut a = XorShift64Star::new(42);
        let mut b = XorShift64Star::new(42);
        for _ in 0..64 {
            let v = a.next_f64_signed();
            assert_eq!(v, b.next_f64_signed());
            assert!(v > -1.0 && v < 1.0);
        }
    }

    #[test]
    fn safe_direction_absorbs_degenerate_separations() {
        assert!(safe_direction(0.0, 0.0).is_none());
        assert!(safe_direction(f64::NAN, 1.0).is_none());

        let (ux, uy, dist) = safe_direction(3.0, 4.0).unwrap();
        assert!((dist - 5.0).abs() < 1e-12);
        assert!((ux - 0.6).abs() < 1e-12);
        assert!((uy - 0.8).abs() < 1e-12);
    }

    #[test]
    fn viewport_falls_back_to_documented_defaults() {
        let settings = AtlasSettings {
            width: f64::NAN,
            height: -5.0,
            ..AtlasSettings::default()
        };
        assert_eq!(viewport(&settings), (800.0, 600.0));
    }
}
