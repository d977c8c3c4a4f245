use std::fmt;

use crate::bar::{self, BarLayout};
use crate::black_square::{self, BlackSquareLayout};
use crate::grid::Grid;

/// Errors surfaced while reading or interpreting a grid file.
#[derive(Debug, Clone)]
pub enum GridFileError {
    Io(String),
    Format(String),
}

impl fmt::Display for GridFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridFileError::Io(path) => write!(f, "Can't read grid file: \"{path}\""),
            GridFileError::Format(message) => write!(f, "{message}"),
        }
    }
}

/// Flag lines shared by both grid formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridFlags {
    pub mirror: bool,
    /// `[wrap_row, wrap_col]`: whether across / down slots continue past the
    /// last column / row.
    pub wrap: [bool; 2],
    /// Whether wrapping lands on the mirror line (Klein-bottle style).
    pub twist: [bool; 2],
}

/// Split a grid file into its flag lines and its content lines. Lines
/// beginning with `#` are comments. Content lines are kept verbatim;
/// both formats are whitespace-significant.
pub fn parse_grid_lines(contents: &str) -> (GridFlags, Vec<String>) {
    let mut flags = GridFlags::default();
    let mut lines = vec![];
    for line in contents.lines() {
        match line {
            "mirror" => flags.mirror = true,
            "wrap_row" => flags.wrap[0] = true,
            "wrap_col" => flags.wrap[1] = true,
            "twist_row" => flags.twist[0] = true,
            "twist_col" => flags.twist[1] = true,
            _ if line.starts_with('#') => {}
            _ => lines.push(line.to_string()),
        }
    }
    (flags, lines)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFormat {
    BlackSquare,
    Bar,
}

/// A bar-delimited file starts with a full row of `-`; anything else is
/// black-square.
#[must_use]
pub fn detect_format(lines: &[String]) -> GridFormat {
    match lines.first() {
        Some(first) if !first.is_empty() && first.bytes().all(|b| b == b'-') => GridFormat::Bar,
        _ => GridFormat::BlackSquare,
    }
}

/// Append the 180-degree rotation of all but the last row.
pub fn mirror_rows(rows: &mut Vec<Vec<u8>>) {
    let n = rows.len();
    if n == 0 {
        return;
    }
    for i in 0..n - 1 {
        let mut rotated = rows[n - i - 2].clone();
        rotated.reverse();
        rows.push(rotated);
    }
}

/// The layout half of a parsed grid file, whichever format it was in.
pub enum GridLayout {
    BlackSquare(BlackSquareLayout),
    Bar(BarLayout),
}

impl GridLayout {
    /// Render the (possibly partially filled) grid in its own format.
    #[must_use]
    pub fn render(&self, grid: &Grid) -> String {
        match self {
            GridLayout::BlackSquare(layout) => layout.render(grid),
            GridLayout::Bar(layout) => layout.render(grid),
        }
    }
}

/// Parse grid file contents in whichever format they are in.
pub fn build_grid(contents: &str) -> Result<(Grid, GridLayout), GridFileError> {
    let (_, lines) = parse_grid_lines(contents);
    match detect_format(&lines) {
        GridFormat::BlackSquare => {
            black_square::build(contents).map(|(grid, layout)| (grid, GridLayout::BlackSquare(layout)))
        }
        GridFormat::Bar => bar::build(contents).map(|(grid, layout)| (grid, GridLayout::Bar(layout))),
    }
}

/// Cell stepping over the grid, taking wrapping and twisting into account.
/// Coordinates are `[row, col]`; `coord` 0 walks along a row (across), 1
/// walks along a column (down). At the seam the twisted line index is
/// `size[coord] - c[coord] - 1`.
#[derive(Debug, Clone, Copy)]
pub struct Topology {
    /// `[nrows, ncols]`
    pub size: [usize; 2],
    pub wrap: [bool; 2],
    pub twist: [bool; 2],
}

impl Topology {
    /// The next cell along the line through `c`.
    #[must_use]
    pub fn next(&self, c: [usize; 2], coord: usize) -> [usize; 2] {
        let cross = 1 - coord;
        let mut d = c;
        if c[cross] + 1 == self.size[cross] {
            d[cross] = 0;
            if self.twist[coord] {
                d[coord] = self.size[coord] - c[coord] - 1;
            }
        } else {
            d[cross] += 1;
        }
        d
    }

    /// The previous cell along the line through `c`.
    #[must_use]
    pub fn prev(&self, c: [usize; 2], coord: usize) -> [usize; 2] {
        let cross = 1 - coord;
        let mut d = c;
        if c[cross] == 0 {
            d[cross] = self.size[cross] - 1;
            if self.twist[coord] {
                d[coord] = self.size[coord] - c[coord] - 1;
            }
        } else {
            d[cross] -= 1;
        }
        d
    }
}

/// The ordered cells of one across or down line. Without wrapping this is a
/// plain path; with wrapping it is the full cycle through the start cell,
/// which under a twist can traverse a line and its mirror line.
#[derive(Debug)]
pub struct Line {
    pub cells: Vec<[usize; 2]>,
    pub cyclic: bool,
}

/// Enumerate the across (`coord` 0) or down (`coord` 1) lines of the grid.
/// Lines already covered by an earlier twisted cycle are skipped.
#[must_use]
pub fn scan_lines(topo: &Topology, coord: usize) -> Vec<Line> {
    let cross = 1 - coord;
    let mut covered = vec![false; topo.size[coord]];
    let mut lines = vec![];
    for index in 0..topo.size[coord] {
        if covered[index] {
            continue;
        }
        covered[index] = true;
        let start = if coord == 0 { [index, 0] } else { [0, index] };
        if topo.wrap[coord] {
            let mut cells = vec![start];
            let mut c = topo.next(start, coord);
            while c != start {
                covered[c[coord]] = true;
                cells.push(c);
                c = topo.next(c, coord);
            }
            lines.push(Line {
                cells,
                cyclic: true,
            });
        } else {
            let cells = (0..topo.size[cross])
                .map(|i| {
                    let mut c = start;
                    c[cross] = i;
                    c
                })
                .collect();
            lines.push(Line {
                cells,
                cyclic: false,
            });
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_and_comment_lines() {
        let (flags, lines) = parse_grid_lines("# a comment\nwrap_row\ntwist_row\n..\n..\n");
        assert!(flags.wrap[0]);
        assert!(flags.twist[0]);
        assert!(!flags.wrap[1]);
        assert!(!flags.mirror);
        assert_eq!(lines, vec!["..", ".."]);
    }

    #[test]
    fn test_format_detection() {
        let (_, bar) = parse_grid_lines("-----\n|. .|\n-----\n");
        assert_eq!(detect_format(&bar), GridFormat::Bar);

        let (_, bs) = parse_grid_lines("*..\n...\n");
        assert_eq!(detect_format(&bs), GridFormat::BlackSquare);
    }

    #[test]
    fn test_mirror_rows() {
        let mut rows: Vec<Vec<u8>> = vec![b"ab*".to_vec(), b"...".to_vec(), b"..x".to_vec()];
        mirror_rows(&mut rows);
        assert_eq!(
            rows,
            vec![
                b"ab*".to_vec(),
                b"...".to_vec(),
                b"..x".to_vec(),
                b"...".to_vec(),
                b"*ba".to_vec(),
            ]
        );
    }

    #[test]
    fn test_topology_stepping_with_twist() {
        let topo = Topology {
            size: [3, 5],
            wrap: [true, false],
            twist: [true, false],
        };
        assert_eq!(topo.next([1, 2], 0), [1, 3]);
        assert_eq!(topo.next([0, 4], 0), [2, 0]);
        assert_eq!(topo.prev([2, 0], 0), [0, 4]);
        // The middle row is the twist's fixed point.
        assert_eq!(topo.next([1, 4], 0), [1, 0]);
    }

    #[test]
    fn test_scan_lines_without_wrap() {
        let topo = Topology {
            size: [2, 3],
            wrap: [false, false],
            twist: [false, false],
        };
        let lines = scan_lines(&topo, 0);
        assert_eq!(lines.len(), 2);
        assert!(!lines[0].cyclic);
        assert_eq!(lines[0].cells, vec![[0, 0], [0, 1], [0, 2]]);

        let columns = scan_lines(&topo, 1);
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[1].cells, vec![[0, 1], [1, 1]]);
    }

    #[test]
    fn test_scan_lines_twisted_cycle_covers_mirror_row() {
        let topo = Topology {
            size: [2, 3],
            wrap: [true, false],
            twist: [true, false],
        };
        let lines = scan_lines(&topo, 0);
        // Rows 0 and 1 are one cycle of six cells.
        assert_eq!(lines.len(), 1);
        assert!(lines[0].cyclic);
        assert_eq!(
            lines[0].cells,
            vec![[0, 0], [0, 1], [0, 2], [1, 0], [1, 1], [1, 2]]
        );
    }
}
