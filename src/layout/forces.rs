use emath::{Vec2, vec2};

use super::quadtree::{BodyTree, Cell};

pub(super) const BARNES_HUT_THETA: f32 = 0.72;
const CHARGE_SOFTENING: f32 = 25.0;

/// Deterministic unit vector for bodies sitting on top of each other.
fn separation_axis(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

fn repulsion(point: Vec2, source: Vec2, strength: f32) -> Vec2 {
    let delta = point - source;
    delta * (strength / (delta.length_sq() + CHARGE_SOFTENING))
}

/// Many-body repulsion on `index`, approximating far cells by their center of mass.
pub(super) fn accumulate_charge(
    tree: &BodyTree,
    cell: &Cell,
    index: usize,
    positions: &[Vec2],
    strength: f32,
    force: &mut Vec2,
) {
    if cell.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if cell.is_leaf() {
        for &other in tree.bodies(cell) {
            if other == index {
                continue;
            }
            if (point - positions[other]).length_sq() <= f32::EPSILON {
                *force += separation_axis(index, other) * (strength / CHARGE_SOFTENING);
            } else {
                *force += repulsion(point, positions[other], strength);
            }
        }
        return;
    }

    let distance = (point - cell.center_of_mass).length().max(0.01);
    let far_enough = !cell.square.contains(point)
        && (cell.square.side() / distance) < BARNES_HUT_THETA
        && cell.mass > 1.0;

    if far_enough {
        *force += repulsion(point, cell.center_of_mass, strength * cell.mass);
        return;
    }

    for child in tree.children(cell) {
        accumulate_charge(tree, child, index, positions, strength, force);
    }
}

fn resolve_overlap(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    deltas: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    let min_distance = radii[from] + radii[to];
    if distance >= min_distance {
        return;
    }

    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        separation_axis(from, to)
    };
    let push = direction * ((min_distance - distance) * 0.5 * strength);
    deltas[from] += push;
    deltas[to] -= push;
}

/// Pushes overlapping bodies apart. Cell pairs whose squares are farther apart
/// than their largest radii could reach are skipped.
pub(super) fn accumulate_collisions(
    tree: &BodyTree,
    (cell_a, cell_b): (&Cell, &Cell),
    same_cell: bool,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    deltas: &mut [Vec2],
) {
    let reach = cell_a.max_radius + cell_b.max_radius;
    if cell_a.square.gap_sq(cell_b.square) > reach * reach {
        return;
    }

    if cell_a.is_leaf() && cell_b.is_leaf() {
        let bodies_a = tree.bodies(cell_a);
        if same_cell {
            for (offset, &from) in bodies_a.iter().enumerate() {
                for &to in &bodies_a[offset + 1..] {
                    resolve_overlap(from, to, positions, radii, strength, deltas);
                }
            }
        } else {
            for &from in bodies_a {
                for &to in tree.bodies(cell_b) {
                    resolve_overlap(from, to, positions, radii, strength, deltas);
                }
            }
        }
        return;
    }

    if same_cell {
        let children = tree.children(cell_a);
        for (offset, first) in children.iter().enumerate() {
            accumulate_collisions(tree, (first, first), true, positions, radii, strength, deltas);
            for second in &children[offset + 1..] {
                accumulate_collisions(tree, (first, second), false, positions, radii, strength, deltas);
            }
        }
        return;
    }

    let split_a = !cell_a.is_leaf()
        && (cell_b.is_leaf() || cell_a.square.half_extent >= cell_b.square.half_extent);

    if split_a {
        for child in tree.children(cell_a) {
            accumulate_collisions(tree, (child, cell_b), false, positions, radii, strength, deltas);
        }
    } else {
        for child in tree.children(cell_b) {
            accumulate_collisions(tree, (cell_a, child), false, positions, radii, strength, deltas);
        }
    }
}
