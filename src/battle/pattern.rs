//! Closed-form range and area patterns
//!
//! Every pattern is a pure function of origin, topology, ring range and kind.
//! Nothing here looks at a grid; callers filter the result against the
//! [`GridStore`](crate::battle::grid_store::GridStore) afterwards.
//!
//! Ring `i` is visited for every `i` in `min..=max` and the output keeps
//! generation order with duplicates removed.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::battle::grid_index::GridIndex;
use crate::battle::topology::Topology;

/// Shape swept by an ability range or area of effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PatternKind {
    #[default]
    None,
    Line,
    Diagonal,
    HalfDiagonal,
    Star,
    Diamond,
    Square,
}

/// Inclusive ring range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RangeSpec {
    pub min: i32,
    pub max: i32,
}

impl RangeSpec {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Both bounds halved with integer division
    pub fn halved(&self) -> Self {
        Self::new(self.min / 2, self.max / 2)
    }

    fn rings(&self) -> std::ops::RangeInclusive<i32> {
        self.min.max(0)..=self.max
    }
}

/// Line-of-sight requirement attached to a range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineOfSight {
    /// Eye height above both tiles
    pub height: f32,
}

/// A pattern plus the filters the orchestrator applies to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AbilityRangeData {
    pub pattern: PatternKind,
    pub range: RangeSpec,
    pub line_of_sight: Option<LineOfSight>,
}

impl AbilityRangeData {
    pub fn new(pattern: PatternKind, range: RangeSpec) -> Self {
        Self {
            pattern,
            range,
            line_of_sight: None,
        }
    }

    pub fn with_line_of_sight(mut self, height: f32) -> Self {
        self.line_of_sight = Some(LineOfSight { height });
        self
    }
}

/// Ordered set of pattern cells, offset to the origin as they arrive
struct Collector {
    origin: GridIndex,
    seen: AHashSet<GridIndex>,
    cells: Vec<GridIndex>,
}

impl Collector {
    fn new(origin: GridIndex) -> Self {
        Self {
            origin,
            seen: AHashSet::new(),
            cells: Vec::new(),
        }
    }

    fn push(&mut self, x: i32, z: i32) {
        self.push_absolute(self.origin + GridIndex::new(x, z));
    }

    fn push_absolute(&mut self, index: GridIndex) {
        if self.seen.insert(index) {
            self.cells.push(index);
        }
    }

    /// Offset in axial space, for hex rays and rings
    fn push_axial(&mut self, dq: i32, dr: i32) {
        let (q, r) = self.origin.to_axial();
        self.push_absolute(GridIndex::from_axial(q + dq, r + dr));
    }
}

const AXIAL_DIRECTIONS: [(i32, i32); 6] = [(1, 0), (-1, 0), (0, 1), (-1, 1), (1, -1), (0, -1)];

const AXIAL_DIAGONALS: [(i32, i32); 6] = [(2, -1), (1, 1), (-1, 2), (-2, 1), (-1, -1), (1, -2)];

// Walk order around a hex ring, starting from the south-west corner.
const AXIAL_RING_WALK: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

fn floor_half(value: i32) -> i32 {
    value.div_euclid(2)
}

fn ceil_half(value: i32) -> i32 {
    -(-value).div_euclid(2)
}

/// Generate the absolute coordinates covered by a pattern
pub fn generate_pattern(
    origin: GridIndex,
    topology: Topology,
    range: RangeSpec,
    kind: PatternKind,
) -> Vec<GridIndex> {
    let mut out = Collector::new(origin);
    match kind {
        PatternKind::None => out.push(0, 0),
        PatternKind::Line => line(&mut out, topology, range),
        PatternKind::Diagonal => diagonal(&mut out, topology, range),
        PatternKind::HalfDiagonal => diagonal(&mut out, topology, range.halved()),
        PatternKind::Star => {
            line(&mut out, topology, range);
            match topology {
                Topology::Square => diagonal(&mut out, topology, range),
                Topology::Hexagon | Topology::Triangle => {
                    diagonal(&mut out, topology, range.halved())
                }
            }
        }
        PatternKind::Diamond => diamond(&mut out, topology, range),
        PatternKind::Square => square(&mut out, topology, range),
    }
    out.cells
}

fn line(out: &mut Collector, topology: Topology, range: RangeSpec) {
    let facing_up = out.origin.is_facing_up();
    for i in range.rings() {
        match topology {
            Topology::Square => {
                out.push(i, 0);
                out.push(-i, 0);
                out.push(0, i);
                out.push(0, -i);
            }
            Topology::Hexagon => {
                for (dq, dr) in AXIAL_DIRECTIONS {
                    out.push_axial(dq * i, dr * i);
                }
            }
            Topology::Triangle => {
                out.push(i, 0);
                out.push(-i, 0);
                // Slanted strips zig-zag, so the rounding depends on facing.
                let (up_x, up_z, down_x, down_z) = if facing_up {
                    (ceil_half(i), floor_half(i), ceil_half(-i), floor_half(-i))
                } else {
                    (floor_half(i), ceil_half(i), floor_half(-i), ceil_half(-i))
                };
                out.push(up_x, up_z);
                out.push(-up_x, up_z);
                out.push(down_x, down_z);
                out.push(-down_x, down_z);
            }
        }
    }
}

fn diagonal(out: &mut Collector, topology: Topology, range: RangeSpec) {
    let facing_up = out.origin.is_facing_up();
    for i in range.rings() {
        match topology {
            Topology::Square => {
                out.push(i, i);
                out.push(-i, -i);
                out.push(-i, i);
                out.push(i, -i);
            }
            Topology::Hexagon => {
                for (dq, dr) in AXIAL_DIAGONALS {
                    out.push_axial(dq * i, dr * i);
                }
            }
            Topology::Triangle => {
                out.push(0, i);
                out.push(0, -i);
                let (far_x, far_z, near_x, near_z) = if facing_up {
                    (
                        floor_half(3 * i),
                        floor_half(i),
                        floor_half(-3 * i),
                        floor_half(-i),
                    )
                } else {
                    (
                        ceil_half(3 * i),
                        ceil_half(i),
                        ceil_half(-3 * i),
                        ceil_half(-i),
                    )
                };
                out.push(far_x, far_z);
                out.push(-far_x, far_z);
                out.push(near_x, near_z);
                out.push(-near_x, near_z);
            }
        }
    }
}

fn diamond(out: &mut Collector, topology: Topology, range: RangeSpec) {
    let facing_up = out.origin.is_facing_up();
    for i in range.rings() {
        match topology {
            Topology::Square => {
                for j in 0..=i {
                    out.push(-(i - j), j);
                    out.push(j, i - j);
                    out.push(i - j, -j);
                    out.push(-j, -(i - j));
                }
            }
            Topology::Hexagon => {
                if i == 0 {
                    out.push(0, 0);
                    continue;
                }
                let (mut q, mut r) = (-i, i);
                for (dq, dr) in AXIAL_RING_WALK {
                    for _ in 0..i {
                        out.push_axial(q, r);
                        q += dq;
                        r += dr;
                    }
                }
            }
            Topology::Triangle => {
                let flip = if facing_up { 1 } else { -1 };
                for j in 0..=i {
                    // Lower-left and upper-right flanks
                    let z = flip * j;
                    let x = 2 * i - j;
                    out.push(-x, z);
                    out.push(x, -z);
                    if j != i {
                        out.push(-x + 1, z);
                    }
                    if j != 0 {
                        out.push(x + 1, -z);
                    }

                    // Upper-left and lower-right flanks
                    let z = flip * (i - j);
                    let x = i + j;
                    out.push(-x, -z);
                    out.push(x, z);
                    if j != i {
                        out.push(-x - 1, -z);
                    }
                    if j != 0 {
                        out.push(x - 1, z);
                    }
                }
                for j in -i..=i {
                    out.push(j, flip * i);
                    out.push(-j, -flip * i);
                }
            }
        }
    }
}

fn square(out: &mut Collector, topology: Topology, range: RangeSpec) {
    for i in range.rings() {
        match topology {
            Topology::Square => {
                for j in -i..=i {
                    out.push(-i, j);
                    out.push(j, i);
                    out.push(i, -j);
                    out.push(-j, -i);
                }
            }
            // Hex and triangle columns are half as wide as rows are tall, so the
            // box spans twice as many columns: max(|dz|, ceil(|dx| / 2)) == i.
            Topology::Hexagon | Topology::Triangle => {
                for j in -i..=i {
                    out.push(-2 * i, j);
                    out.push(2 * i, -j);
                    if i != 0 {
                        out.push(-2 * i + 1, j);
                        out.push(2 * i - 1, -j);
                    }
                }
                for j in (-2 * i)..=(2 * i) {
                    out.push(j, i);
                    out.push(-j, -i);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::topology::hex_distance;

    fn sorted(mut cells: Vec<GridIndex>) -> Vec<GridIndex> {
        cells.sort();
        cells
    }

    fn relative(origin: GridIndex, cells: &[GridIndex]) -> Vec<GridIndex> {
        sorted(cells.iter().map(|cell| *cell - origin).collect())
    }

    #[test]
    fn test_none_is_origin() {
        let origin = GridIndex::new(4, -2);
        for topology in [Topology::Square, Topology::Hexagon, Topology::Triangle] {
            let cells = generate_pattern(origin, topology, RangeSpec::new(1, 5), PatternKind::None);
            assert_eq!(cells, vec![origin]);
        }
    }

    #[test]
    fn test_square_line_range_one() {
        let cells = generate_pattern(
            GridIndex::ZERO,
            Topology::Square,
            RangeSpec::new(1, 1),
            PatternKind::Line,
        );
        assert_eq!(
            sorted(cells),
            vec![
                GridIndex::new(-1, 0),
                GridIndex::new(0, -1),
                GridIndex::new(0, 1),
                GridIndex::new(1, 0),
            ]
        );
    }

    #[test]
    fn test_output_is_absolute() {
        let origin = GridIndex::new(10, 10);
        let cells = generate_pattern(origin, Topology::Square, RangeSpec::new(2, 2), PatternKind::Diagonal);
        assert!(cells.contains(&GridIndex::new(12, 12)));
        assert!(cells.contains(&GridIndex::new(8, 12)));
        assert_eq!(cells.len(), 4);
    }

    #[test]
    fn test_square_diamond_is_manhattan_ring() {
        let cells = generate_pattern(GridIndex::ZERO, Topology::Square, RangeSpec::new(3, 3), PatternKind::Diamond);
        assert_eq!(cells.len(), 12);
        assert!(cells.iter().all(|c| c.x.abs() + c.z.abs() == 3));
    }

    #[test]
    fn test_square_box_ring() {
        let cells = generate_pattern(GridIndex::ZERO, Topology::Square, RangeSpec::new(2, 2), PatternKind::Square);
        assert_eq!(cells.len(), 16);
        assert!(cells.iter().all(|c| c.x.abs().max(c.z.abs()) == 2));
    }

    #[test]
    fn test_hex_line_is_six_rays() {
        for origin in [GridIndex::new(3, 2), GridIndex::new(3, 3)] {
            let cells = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(1, 1), PatternKind::Line);
            let mut neighbors: Vec<_> = Topology::Hexagon.neighbors(origin).collect();
            neighbors.sort();
            assert_eq!(sorted(cells), neighbors);
        }
    }

    #[test]
    fn test_hex_diamond_is_ring() {
        let origin = GridIndex::new(5, 3);
        for i in 1..=4 {
            let cells = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(i, i), PatternKind::Diamond);
            assert_eq!(cells.len(), 6 * i as usize);
            assert!(cells.iter().all(|c| hex_distance(origin, *c) == i as u32));
        }
    }

    #[test]
    fn test_hex_diagonal_lands_two_rows_up() {
        let origin = GridIndex::new(2, 2);
        let cells = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(1, 1), PatternKind::Diagonal);
        assert!(cells.contains(&GridIndex::new(2, 4)));
        assert!(cells.contains(&GridIndex::new(2, 0)));
        assert!(cells.iter().all(|c| hex_distance(origin, *c) == 2));
    }

    #[test]
    fn test_triangle_line_depends_on_facing() {
        let up = GridIndex::new(0, 0);
        let down = GridIndex::new(1, 0);
        let up_cells = relative(up, &generate_pattern(up, Topology::Triangle, RangeSpec::new(1, 1), PatternKind::Line));
        let down_cells = relative(down, &generate_pattern(down, Topology::Triangle, RangeSpec::new(1, 1), PatternKind::Line));
        assert!(up_cells.contains(&GridIndex::new(0, -1)));
        assert!(down_cells.contains(&GridIndex::new(0, 1)));
        assert_ne!(up_cells, down_cells);
    }

    #[test]
    fn test_triangle_diamond_mirrors_across_x() {
        for origin in [GridIndex::new(0, 0), GridIndex::new(1, 0)] {
            let cells = generate_pattern(origin, Topology::Triangle, RangeSpec::new(1, 3), PatternKind::Diamond);
            let rel = relative(origin, &cells);
            let mirrored = sorted(rel.iter().map(|c| GridIndex::new(-c.x, c.z)).collect());
            assert_eq!(rel, mirrored);
        }
    }

    #[test]
    fn test_offset_box_ring() {
        let cells = generate_pattern(GridIndex::ZERO, Topology::Hexagon, RangeSpec::new(1, 1), PatternKind::Square);
        assert!(cells
            .iter()
            .all(|c| c.z.abs().max((c.x.abs() + 1) / 2) == 1));
        // rows z = +-1 span five columns, the middle row adds +-1 and +-2
        assert_eq!(cells.len(), 14);
    }

    #[test]
    fn test_half_diagonal_halves_range() {
        let origin = GridIndex::new(4, 4);
        let half = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(2, 4), PatternKind::HalfDiagonal);
        let full = generate_pattern(origin, Topology::Hexagon, RangeSpec::new(1, 2), PatternKind::Diagonal);
        assert_eq!(sorted(half), sorted(full));
    }

    #[test]
    fn test_star_is_union() {
        let origin = GridIndex::new(6, 6);
        let range = RangeSpec::new(1, 4);
        for topology in [Topology::Square, Topology::Hexagon, Topology::Triangle] {
            let star = generate_pattern(origin, topology, range, PatternKind::Star);
            let diagonal_kind = if topology == Topology::Square {
                PatternKind::Diagonal
            } else {
                PatternKind::HalfDiagonal
            };
            let mut union = generate_pattern(origin, topology, range, PatternKind::Line);
            for cell in generate_pattern(origin, topology, range, diagonal_kind) {
                if !union.contains(&cell) {
                    union.push(cell);
                }
            }
            assert_eq!(sorted(star), sorted(union), "{:?}", topology);
        }
    }

    #[test]
    fn test_empty_range() {
        let cells = generate_pattern(GridIndex::ZERO, Topology::Square, RangeSpec::new(3, 1), PatternKind::Line);
        assert!(cells.is_empty());
    }

    #[test]
    fn test_no_duplicates() {
        for kind in [PatternKind::Line, PatternKind::Diamond, PatternKind::Square, PatternKind::Star] {
            let cells = generate_pattern(GridIndex::new(1, 1), Topology::Triangle, RangeSpec::new(0, 4), kind);
            let unique: AHashSet<_> = cells.iter().copied().collect();
            assert_eq!(unique.len(), cells.len());
        }
    }
}
