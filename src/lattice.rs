// Lattice Module - Hexagonal dot lattice geometry
//
// All coordinates are canvas-space: x grows right, y grows down, row 0 is
// the top row. Index order is row-major and is meaningful everywhere else
// in the engine (index <-> grid slot is a bijection).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One lattice point in canvas coordinates. Immutable once generated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// The default 7-row hexagon: 37 dots.
pub const DEFAULT_ROW_COUNTS: [usize; 7] = [4, 5, 6, 7, 6, 5, 4];

/// Generate the hexagonal lattice for the given canvas and row shape.
///
/// Rows are stacked at the hexagonal row pitch `spacing * sqrt(3)/2`,
/// vertically centered around `height/2`; each row is horizontally
/// centered around `width/2`. Deterministic and total: a degenerate
/// `row_counts` simply yields a degenerate lattice.
pub fn generate_lattice(width: f64, height: f64, spacing: f64, row_counts: &[usize]) -> Vec<Point> {
    let row_height = spacing * 3.0_f64.sqrt() / 2.0;
    let center_x = width / 2.0;
    let center_y = height / 2.0;

    let mut dots = Vec::with_capacity(row_counts.iter().sum());
    for (row_index, &count) in row_counts.iter().enumerate() {
        let y = center_y + (row_index as f64 - (row_counts.len() / 2) as f64) * row_height;
        let start_x = center_x - (count.saturating_sub(1)) as f64 * spacing / 2.0;

        for i in 0..count {
            dots.push(Point {
                x: start_x + i as f64 * spacing,
                y,
            });
        }
    }

    dots
}

/// The denser lattice the enriching mode zooms into. Same construction at a
/// finer pitch.
pub fn generate_fine_lattice(
    width: f64,
    height: f64,
    fine_spacing: f64,
    fine_row_counts: &[usize],
) -> Vec<Point> {
    generate_lattice(width, height, fine_spacing, fine_row_counts)
}

/// Indices of the dots forming the small hexagon at the visual center:
/// rows 2, 3 and 4 contribute 2, 3 and 2 dots, offset +2 from each row
/// start. Only meaningful for the default 7-row shape; any other shape has
/// no defined center subset and gets an empty set.
pub fn center_subset(row_counts: &[usize]) -> BTreeSet<usize> {
    let mut selected = BTreeSet::new();
    if row_counts.len() != 7 {
        return selected;
    }

    let mut dot_index = 0;
    for (row_index, &count) in row_counts.iter().enumerate() {
        match row_index {
            2 | 4 => {
                selected.insert(dot_index + 2);
                selected.insert(dot_index + 3);
            }
            3 => {
                selected.insert(dot_index + 2);
                selected.insert(dot_index + 3);
                selected.insert(dot_index + 4);
            }
            _ => {}
        }
        dot_index += count;
    }

    selected
}

/// Total dot count for a row shape.
pub fn dot_count(row_counts: &[usize]) -> usize {
    row_counts.iter().sum()
}

/// Start index of each row in the row-major ordering.
pub fn row_starts(row_counts: &[usize]) -> Vec<usize> {
    let mut starts = Vec::with_capacity(row_counts.len());
    let mut acc = 0;
    for &count in row_counts {
        starts.push(acc);
        acc += count;
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_count_matches_row_sum() {
        let dots = generate_lattice(300.0, 300.0, 25.0, &DEFAULT_ROW_COUNTS);
        assert_eq!(dots.len(), 37);
        assert_eq!(dots.len(), dot_count(&DEFAULT_ROW_COUNTS));
    }

    #[test]
    fn test_rows_share_y_at_hex_pitch() {
        let spacing = 25.0;
        let dots = generate_lattice(300.0, 300.0, spacing, &DEFAULT_ROW_COUNTS);
        let starts = row_starts(&DEFAULT_ROW_COUNTS);
        let pitch = spacing * 3.0_f64.sqrt() / 2.0;

        for (row, &start) in starts.iter().enumerate() {
            let count = DEFAULT_ROW_COUNTS[row];
            let y = dots[start].y;
            for i in 0..count {
                assert_eq!(dots[start + i].y, y);
            }
            if row > 0 {
                let prev_y = dots[starts[row - 1]].y;
                assert!((y - prev_y - pitch).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_rows_are_horizontally_centered() {
        let width = 300.0;
        let dots = generate_lattice(width, 300.0, 25.0, &DEFAULT_ROW_COUNTS);
        let starts = row_starts(&DEFAULT_ROW_COUNTS);

        for (row, &start) in starts.iter().enumerate() {
            let count = DEFAULT_ROW_COUNTS[row];
            let first = dots[start].x;
            let last = dots[start + count - 1].x;
            assert!((first + last - width).abs() < 1e-9);
        }
    }

    #[test]
    fn test_middle_row_is_vertically_centered() {
        let dots = generate_lattice(300.0, 300.0, 25.0, &DEFAULT_ROW_COUNTS);
        let starts = row_starts(&DEFAULT_ROW_COUNTS);
        assert_eq!(dots[starts[3]].y, 150.0);
    }

    #[test]
    fn test_center_subset_default_shape() {
        let subset = center_subset(&DEFAULT_ROW_COUNTS);
        assert_eq!(subset.len(), 7);

        // All indices must land in rows 2-4 (indices 9..=27 of the default shape).
        let starts = row_starts(&DEFAULT_ROW_COUNTS);
        let row2 = starts[2];
        let row5 = starts[5];
        assert!(subset.iter().all(|&i| i >= row2 && i < row5));
        assert_eq!(
            subset.iter().copied().collect::<Vec<_>>(),
            vec![11, 12, 17, 18, 19, 24, 25]
        );
    }

    #[test]
    fn test_center_subset_depends_only_on_shape() {
        // Same 7-row shape, different widths: the subset is still 7 indices
        // computed from the same per-row offsets.
        let wider = [5, 6, 7, 8, 7, 6, 5];
        let subset = center_subset(&wider);
        assert_eq!(subset.len(), 7);
        let starts = row_starts(&wider);
        assert_eq!(
            subset.iter().copied().collect::<Vec<_>>(),
            vec![
                starts[2] + 2,
                starts[2] + 3,
                starts[3] + 2,
                starts[3] + 3,
                starts[3] + 4,
                starts[4] + 2,
                starts[4] + 3,
            ]
        );
    }

    #[test]
    fn test_center_subset_undefined_for_other_shapes() {
        assert!(center_subset(&[3, 4, 3]).is_empty());
        assert!(center_subset(&[4, 5, 6, 7, 6, 5]).is_empty());
    }

    #[test]
    fn test_fine_lattice_is_denser() {
        let coarse = generate_lattice(300.0, 300.0, 25.0, &DEFAULT_ROW_COUNTS);
        let fine_rows: Vec<usize> = vec![7, 8, 9, 10, 11, 12, 13, 12, 11, 10, 9, 8, 7];
        let fine = generate_fine_lattice(300.0, 300.0, 12.5, &fine_rows);
        assert!(fine.len() > coarse.len());
        assert_eq!(fine.len(), dot_count(&fine_rows));
    }
}
