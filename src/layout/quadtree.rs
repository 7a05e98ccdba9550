use std::ops::Range;

use emath::{Vec2, vec2};

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: usize = 10;

/// Axis-aligned square region.
#[derive(Clone, Copy, Debug)]
pub(super) struct Square {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl Square {
    /// Smallest padded square around the finite points, if there are any.
    fn around(points: &[Vec2]) -> Option<Self> {
        let (min, max) = points
            .iter()
            .filter(|point| point.x.is_finite() && point.y.is_finite())
            .fold(None, |bounds: Option<(Vec2, Vec2)>, &point| {
                Some(bounds.map_or((point, point), |(min, max)| {
                    (min.min(point), max.max(point))
                }))
            })?;

        Some(Self {
            center: (min + max) * 0.5,
            half_extent: (max - min).max_elem().max(1.0) * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        let offset = (point - self.center).abs();
        offset.x <= self.half_extent && offset.y <= self.half_extent
    }

    /// Quadrant index: bit 0 is east, bit 1 is south.
    fn quadrant_of(self, point: Vec2) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn quadrant(self, quadrant: usize) -> Self {
        let half_extent = self.half_extent * 0.5;
        let sign = |bit: usize| if quadrant & bit == 0 { -1.0 } else { 1.0 };
        Self {
            center: self.center + vec2(sign(1), sign(2)) * half_extent,
            half_extent,
        }
    }

    pub(super) fn side(self) -> f32 {
        self.half_extent * 2.0
    }

    /// Squared gap between two squares, zero when they overlap.
    pub(super) fn gap_sq(self, other: Self) -> f32 {
        let reach = self.half_extent + other.half_extent;
        let gap = ((self.center - other.center).abs() - Vec2::splat(reach)).max(Vec2::ZERO);
        gap.length_sq()
    }
}

/// One region of a [`BodyTree`]. Every cell owns a contiguous run of the
/// tree's body order, so inner cells see all bodies below them.
#[derive(Clone, Debug)]
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    /// Largest collision radius of any body below this cell.
    pub(super) max_radius: f32,
    bodies: Range<usize>,
    children: Range<usize>,
}

impl Cell {
    fn unfilled(square: Square, bodies: Range<usize>) -> Self {
        Self {
            square,
            center_of_mass: Vec2::ZERO,
            mass: 0.0,
            max_radius: 0.0,
            bodies,
            children: 0..0,
        }
    }

    fn finish(&mut self, mass: f32, weighted: Vec2, max_radius: f32) {
        self.mass = mass;
        self.max_radius = max_radius;
        if mass > 0.0 {
            self.center_of_mass = weighted / mass;
        }
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Flat Barnes-Hut tree over one tick's positions. Cells live in an arena,
/// siblings are adjacent, and mass, center of mass and collision reach are
/// aggregated bottom-up while building.
pub(super) struct BodyTree {
    cells: Vec<Cell>,
    order: Vec<usize>,
}

impl BodyTree {
    /// `radii` is indexed like `positions`. Non-finite positions are left out.
    pub(super) fn build(positions: &[Vec2], radii: &[f32]) -> Option<Self> {
        let square = Square::around(positions)?;
        let order = (0..positions.len())
            .filter(|&index| square.contains(positions[index]))
            .collect::<Vec<_>>();

        let mut tree = Self {
            cells: Vec::with_capacity(1 + 2 * order.len() / LEAF_CAPACITY),
            order,
        };
        tree.cells.push(Cell::unfilled(square, 0..tree.order.len()));
        tree.fill(0, positions, radii, 0);
        Some(tree)
    }

    pub(super) fn root(&self) -> &Cell {
        &self.cells[0]
    }

    pub(super) fn children(&self, cell: &Cell) -> &[Cell] {
        &self.cells[cell.children.clone()]
    }

    pub(super) fn bodies(&self, cell: &Cell) -> &[usize] {
        &self.order[cell.bodies.clone()]
    }

    fn fill(&mut self, id: usize, positions: &[Vec2], radii: &[f32], depth: usize) {
        let square = self.cells[id].square;
        let span = self.cells[id].bodies.clone();

        if depth < MAX_DEPTH && span.len() > LEAF_CAPACITY {
            let bodies = &mut self.order[span.clone()];
            let mut counts = [0usize; 4];
            for &index in bodies.iter() {
                counts[square.quadrant_of(positions[index])] += 1;
            }

            // A single occupied quadrant means coincident bodies; splitting
            // would only recurse to MAX_DEPTH.
            if counts.iter().filter(|&&count| count > 0).count() > 1 {
                bodies.sort_unstable_by_key(|&index| square.quadrant_of(positions[index]));

                let first = self.cells.len();
                let mut start = span.start;
                for (quadrant, count) in counts.into_iter().enumerate() {
                    if count > 0 {
                        self.cells
                            .push(Cell::unfilled(square.quadrant(quadrant), start..start + count));
                    }
                    start += count;
                }
                let children = first..self.cells.len();
                for child in children.clone() {
                    self.fill(child, positions, radii, depth + 1);
                }

                let (mass, weighted, max_radius) = self.cells[children.clone()].iter().fold(
                    (0.0, Vec2::ZERO, 0.0f32),
                    |(mass, weighted, max_radius), child| {
                        (
                            mass + child.mass,
                            weighted + child.center_of_mass * child.mass,
                            max_radius.max(child.max_radius),
                        )
                    },
                );
                let cell = &mut self.cells[id];
                cell.children = children;
                cell.finish(mass, weighted, max_radius);
                return;
            }
        }

        let (weighted, max_radius) = self.order[span.clone()].iter().fold(
            (Vec2::ZERO, 0.0f32),
            |(weighted, max_radius), &index| {
                (
                    weighted + positions[index],
                    max_radius.max(radii.get(index).copied().unwrap_or(0.0)),
                )
            },
        );
        self.cells[id].finish(span.len() as f32, weighted, max_radius);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(count: usize) -> Vec<Vec2> {
        (0..count)
            .map(|index| vec2((index % 17) as f32 * 9.0, (index / 17) as f32 * 7.0))
            .collect()
    }

    fn leaf_bodies(tree: &BodyTree, cell: &Cell) -> usize {
        if cell.is_leaf() {
            tree.bodies(cell).len()
        } else {
            tree.children(cell).iter().map(|child| leaf_bodies(tree, child)).sum()
        }
    }

    #[test]
    fn every_body_lands_in_exactly_one_leaf() {
        let positions = grid(200);
        let tree = BodyTree::build(&positions, &[1.0; 200]).expect("finite positions");

        assert!(!tree.root().is_leaf());
        assert_eq!(tree.root().mass as usize, 200);
        assert_eq!(leaf_bodies(&tree, tree.root()), 200);

        let mut seen = tree.bodies(tree.root()).to_vec();
        seen.sort_unstable();
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    #[test]
    fn inner_cells_aggregate_their_children() {
        let positions = grid(120);
        let radii = (0..120).map(|index| 1.0 + (index % 7) as f32).collect::<Vec<_>>();
        let tree = BodyTree::build(&positions, &radii).expect("finite positions");

        let mean = positions.iter().fold(Vec2::ZERO, |sum, point| sum + *point) / 120.0;
        assert!((tree.root().center_of_mass - mean).length() < 1e-3);
        assert_eq!(tree.root().max_radius, 7.0);

        for child in tree.children(tree.root()) {
            let bodies = tree.bodies(child);
            let expected = bodies
                .iter()
                .map(|&index| radii[index])
                .fold(0.0f32, f32::max);
            assert_eq!(child.max_radius, expected);
            assert!(bodies.iter().all(|&index| child.square.contains(positions[index])));
        }
    }

    #[test]
    fn coincident_bodies_stay_in_one_leaf() {
        let positions = vec![vec2(3.0, 3.0); 40];
        let tree = BodyTree::build(&positions, &[2.0; 40]).expect("finite positions");
        assert!(tree.root().is_leaf());
        assert_eq!(tree.bodies(tree.root()).len(), 40);
    }

    #[test]
    fn non_finite_positions_are_skipped() {
        let positions = vec![vec2(0.0, 0.0), vec2(f32::NAN, 1.0), vec2(5.0, 5.0)];
        let tree = BodyTree::build(&positions, &[1.0; 3]).expect("two finite positions");
        assert_eq!(tree.bodies(tree.root()), &[0, 2]);
        assert!(BodyTree::build(&[], &[]).is_none());
        assert!(BodyTree::build(&[vec2(f32::INFINITY, 0.0)], &[1.0]).is_none());
    }
}
