//! Tick-local Barnes-Hut quadtree.
//!
//! Rebuilt from scratch each tick over the current node positions, queried once per node for
//! approximate repulsion, then dropped. Leaves hold at most [`LEAF_CAPACITY`] points; a region
//! far enough away (`side / distance < theta`) is collapsed to a single point mass at its
//! geometric center with mass equal to its contained point count.

use tracing::{trace, warn};

use super::safe_direction;
use crate::graph::Node;

/// Points per leaf before subdivision. One point per leaf keeps every near-field interaction
/// an exact pairwise term.
const LEAF_CAPACITY: usize = 1;

/// Subdivision stops here. Coincident points cannot be separated by any number of splits, so
/// at the cap the leaf absorbs the overflow and the query falls back to pairwise terms.
const MAX_DEPTH: usize = 32;

/// Padding applied to the enclosing box so boundary points are strictly inside.
const BOUNDS_PAD: f64 = 1e-6;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

impl Bounds {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    fn side(&self) -> f64 {
        (self.x_max - self.x_min).max(self.y_max - self.y_min)
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f64,
    y: f64,
    node: usize,
}

/// Tagged cell state instead of a "divided" flag with null children.
#[derive(Debug)]
enum Cell {
    Leaf {
        points: Vec<Point>,
    },
    Internal {
        /// Northwest, northeast, southwest, southeast. Probe order doubles as the midline
        /// tie-break: a point exactly on a split line lands in the west/north quadrant.
        children: Box<[QuadTree; 4]>,
        /// Points contained anywhere in this subtree; the aggregate mass.
        count: usize,
    },
}

#[derive(Debug)]
pub struct QuadTree {
    bounds: Bounds,
    depth: usize,
    cell: Cell,
}

impl QuadTree {
    /// Build the index over every node position: minimal enclosing box, then one insert per
    /// node. Positions are sanitized before the tree is built, so a rejected insert is
    /// unexpected — it is logged and the node simply does not participate in repulsion.
    pub fn build(nodes: &[Node]) -> Self {
        let mut x_min = f64::INFINITY;
        let mut x_max = f64::NEG_INFINITY;
        let mut y_min = f64::INFINITY;
        let mut y_max = f64::NEG_INFINITY;
        for node in nodes {
            x_min = x_min.min(node.x);
            x_max = x_max.max(node.x);
            y_min = y_min.min(node.y);
            y_max = y_max.max(node.y);
        }

        let bounds = if x_min.is_finite() && x_max.is_finite() && y_min.is_finite() && y_max.is_finite() {
            Bounds {
                x_min: x_min - BOUNDS_PAD,
                x_max: x_max + BOUNDS_PAD,
                y_min: y_min - BOUNDS_PAD,
                y_max: y_max + BOUNDS_PAD,
            }
        } else {
            Bounds {
                x_min: 0.0,
                x_max: 1.0,
                y_min: 0.0,
                y_max: 1.0,
            }
        };

        let mut tree = Self {
            bounds,
            depth: 0,
            cell: Cell::Leaf { points: Vec::new() },
        };
        for (index, node) in nodes.iter().enumerate() {
            if !tree.insert(node.x, node.y, index) {
                warn!(
                    node = index,
                    "position outside spatial index bounds, excluded from repulsion"
                );
            }
        }
        tree
    }

    /// Insert a point. Returns `false` (never panics) when the point falls outside this
    /// cell's bounds.
    pub fn insert(&mut self, x: f64, y: f64, node: usize) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }

        if let Cell::Leaf { points } = &mut self.cell {
            if points.len() < LEAF_CAPACITY || self.depth >= MAX_DEPTH {
                points.push(Point { x, y, node });
                return true;
            }
            self.subdivide();
        }

        let Cell::Internal { children, count } = &mut self.cell else {
            return false;
        };
        for child in children.iter_mut() {
            if child.insert(x, y, node) {
                *count += 1;
                return true;
            }
        }
        false
    }

    /// Split into four equal quadrants and redistribute the held points.
    fn subdivide(&mut self) {
        let (cx, cy) = self.bounds.center();
        let Bounds {
            x_min,
            x_max,
            y_min,
            y_max,
        } = self.bounds;
        let depth = self.depth + 1;
        let quadrant = |x0: f64, x1: f64, y0: f64, y1: f64| QuadTree {
            bounds: Bounds {
                x_min: x0,
                x_max: x1,
                y_min: y0,
                y_max: y1,
            },
            depth,
            cell: Cell::Leaf { points: Vec::new() },
        };
        let mut children = Box::new([
            quadrant(x_min, cx, y_min, cy), // northwest
            quadrant(cx, x_max, y_min, cy), // northeast
            quadrant(x_min, cx, cy, y_max), // southwest
            quadrant(cx, x_max, cy, y_max), // southeast
        ]);

        let points = match &mut self.cell {
            Cell::Leaf { points } => std::mem::take(points),
            Cell::Internal { .. } => return,
        };
        let mut count = 0;
        for p in points {
            for child in children.iter_mut() {
                if child.insert(p.x, p.y, p.node) {
                    count += 1;
                    break;
                }
            }
        }
        self.cell = Cell::Internal { children, count };
    }

    /// Net approximate repulsion on `node` at `(x, y)` from every other point in the tree.
    pub fn repulsion(&self, node: usize, x: f64, y: f64, theta: f64, strength: f64) -> (f64, f64) {
        let mut fx = 0.0;
        let mut fy = 0.0;
        self.accumulate_repulsion(node, x, y, theta, strength, &mut fx, &mut fy);
        (fx, fy)
    }

    #[allow(clippy::too_many_arguments)]
    fn accumulate_repulsion(
        &self,
        node: usize,
        x: f64,
        y: f64,
        theta: f64,
        strength: f64,
        fx: &mut f64,
        fy: &mut f64,
    ) {
        match &self.cell {
            Cell::Leaf { points } => {
                for p in points {
                    if p.node == node {
                        continue;
                    }
                    let Some((ux, uy, dist)) = safe_direction(x - p.x, y - p.y) else {
                        trace!(node, other = p.node, "coincident pair contributes no repulsion");
                        continue;
                    };
                    let magnitude = strength / (dist * dist);
                    if !magnitude.is_finite() {
                        warn!(
                            node,
                            other = p.node,
                            "non-finite repulsion contribution dropped"
                        );
                        continue;
                    }
                    *fx += ux * magnitude;
                    *fy += uy * magnitude;
                }
            }
            Cell::Internal { children, count } => {
                let (cx, cy) = self.bounds.center();
                if let Some((ux, uy, dist)) = safe_direction(x - cx, y - cy) {
                    if self.bounds.side() / dist < theta {
                        let magnitude = strength * (*count as f64) / (dist * dist);
                        if magnitude.is_finite() {
                            *fx += ux * magnitude;
                            *fy += uy * magnitude;
                        } else {
                            warn!(node, "non-finite aggregate repulsion dropped");
                        }
                        return;
                    }
                }
                for child in children.iter() {
                    child.accumulate_repulsion(node, x, y, theta, strength, fx, fy);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes_at(positions: &[(f64, f64)]) -> Vec<Node> {
        positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Node::at(format!("n{i}"), x, y))
            .collect()
    }

    /// Brute-force pairwise sum the tree must converge to as theta goes to zero.
    fn exact_repulsion(nodes: &[Node], node: usize, strength: f64) -> (f64, f64) {
        let mut fx = 0.0;
        let mut fy = 0.0;
        for (j, other) in nodes.iter().enumerate() {
            if j == node {
                continue;
            }
            let dx = nodes[node].x - other.x;
            let dy = nodes[node].y - other.y;
            let d2 = dx * dx + dy * dy;
            if d2 == 0.0 {
                continue;
            }
            let d = d2.sqrt();
            let f = strength / d2;
            fx += f * dx / d;
            fy += f * dy / d;
        }
        (fx, fy)
    }

    #[test]
    fn insert_rejects_points_outside_bounds() {
        let nodes = nodes_at(&[(10.0, 10.0), (90.0, 90.0)]);
        let mut tree = QuadTree::build(&nodes);
        assert!(!tree.insert(500.0, 500.0, 99));
        assert!(tree.insert(50.0, 50.0, 2));
    }

    #[test]
    fn subdivision_keeps_points_at_leaves() {
        let nodes = nodes_at(&[(10.0, 10.0), (90.0, 90.0), (90.0, 10.0), (10.0, 90.0)]);
        let tree = QuadTree::build(&nodes);
        let Cell::Internal { count, .. } = &tree.cell else {
            panic!("four spread points must force a subdivision");
        };
        assert_eq!(*count, 4);
    }

    #[test]
    fn zero_theta_matches_exact_pairwise_sum() {
        let nodes = nodes_at(&[
            (12.0, 7.0),
            (83.0, 41.0),
            (55.0, 90.0),
            (21.0, 64.0),
            (70.0, 13.0),
            (39.0, 33.0),
            (95.0, 77.0),
            (4.0, 48.0),
            (61.0, 58.0),
            (28.0, 86.0),
        ]);
        let tree = QuadTree::build(&nodes);
        for (i, n) in nodes.iter().enumerate() {
            let (fx, fy) = tree.repulsion(i, n.x, n.y, 0.0, 800.0);
            let (ex, ey) = exact_repulsion(&nodes, i, 800.0);
            assert!(
                (fx - ex).abs() < 1e-9 && (fy - ey).abs() < 1e-9,
                "node {i}: got ({fx}, {fy}), expected ({ex}, {ey})"
            );
        }
    }

    #[test]
    fn far_cluster_is_aggregated_in_the_right_direction() {
        // Query node at the origin, a tight cluster far out on +x. With theta 0.5 the cluster
        // collapses to one aggregate; the push must stay leftward and in the same ballpark as
        // the exact sum (the geometric-center approximation is coarse, not wrong).
        let nodes = nodes_at(&[
            (0.0, 0.0),
            (1000.0, -4.0),
            (1004.0, 3.0),
            (997.0, 5.0),
            (1002.0, -2.0),
        ]);
        let tree = QuadTree::build(&nodes);
        let (fx, _) = tree.repulsion(0, 0.0, 0.0, 0.5, 1000.0);
        let (ex, _) = exact_repulsion(&nodes, 0, 1000.0);
        assert!(fx < 0.0, "repulsion must push the query away from the cluster");
        assert!(
            (fx - ex).abs() <= ex.abs() * 0.5,
            "aggregate {fx} strays too far from exact {ex}"
        );
    }

    #[test]
    fn coincident_points_do_not_recurse_forever() {
        // Two identical points can never be separated by subdivision; the depth cap lets the
        // leaf overflow instead. They contribute nothing to each other but still feel the
        // third, distinct point.
        let nodes = nodes_at(&[(50.0, 50.0), (50.0, 50.0), (80.0, 50.0)]);
        let tree = QuadTree::build(&nodes);

        let (fx, fy) = tree.repulsion(0, 50.0, 50.0, 0.0, 900.0);
        assert!(fx < 0.0, "pushed away from the distinct point only");
        assert!(fy.abs() < 1e-12);
        assert!(fx.is_finite() && fy.is_finite());
    }
}
