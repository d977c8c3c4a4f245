//! The bar-delimited grid format (Atlantic-cryptic style). The file
//! alternates bar rows and cell rows: odd rows hold cells at odd columns
//! (`.` blank or a lowercase preset) with `|` bars at even columns, and even
//! rows hold `-` bars at odd columns between vertically adjacent cells. Both
//! file dimensions are odd, and the first row is a solid run of `-`.
//! Unchecked cells are permitted; a cell that belongs to no slot at all is
//! an error.

use crate::builder::{mirror_rows, parse_grid_lines, scan_lines, GridFileError, Line, Topology};
use crate::grid::Grid;
use crate::types::SlotId;
use crate::{MAX_SLOT_COUNT, MAX_SLOT_LENGTH};

type CellTable = Vec<Vec<Option<(SlotId, usize)>>>;

/// The file image plus cell geometry, for rendering search state.
pub struct BarLayout {
    pub size: [usize; 2],
    image: Vec<Vec<u8>>,
    across: CellTable,
    down: CellTable,
}

impl BarLayout {
    /// Render the (possibly partially filled) grid by writing each cell's
    /// letter back into the file image. Unchecked cells draw from whichever
    /// slot covers them.
    #[must_use]
    pub fn render(&self, grid: &Grid) -> String {
        let mut image = self.image.clone();
        for row in 0..self.size[0] {
            for col in 0..self.size[1] {
                let (id, pos) = self.across[row][col]
                    .or(self.down[row][col])
                    .expect("cell without a slot survived the build");
                image[row * 2 + 1][col * 2 + 1] = grid.slots[id].letter(pos);
            }
        }
        image
            .into_iter()
            .map(|line| String::from_utf8(line).expect("grid image is ASCII"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn valid_even_row(line: &[u8]) -> bool {
    line.iter().all(|&b| b == b'-' || b == b' ')
}

fn valid_odd_row(line: &[u8]) -> bool {
    line.iter().enumerate().all(|(i, &b)| {
        if i % 2 == 1 {
            b == b'.' || b.is_ascii_lowercase()
        } else {
            b == b'|' || b == b' '
        }
    })
}

/// Parse bar grid file contents into a grid plus its layout.
#[allow(clippy::too_many_lines)]
pub fn build(contents: &str) -> Result<(Grid, BarLayout), GridFileError> {
    let (flags, lines) = parse_grid_lines(contents);
    if lines.is_empty() {
        return Err(GridFileError::Format("grid file has no rows".into()));
    }

    let first = lines[0].as_bytes();
    if first.is_empty() || !first.iter().all(|&b| b == b'-') {
        return Err(GridFileError::Format(format!(
            "first row must be all '-': \"{}\"",
            lines[0]
        )));
    }
    if first.len() % 2 == 0 {
        return Err(GridFileError::Format(
            "first row must have odd length".into(),
        ));
    }
    let ncols = first.len();

    let mut image: Vec<Vec<u8>> = vec![];
    for (file_row, line) in lines.iter().enumerate() {
        let mut bytes = line.as_bytes().to_vec();
        if bytes.len() > ncols {
            return Err(GridFileError::Format(format!(
                "size mismatch in \"{line}\": {} > {ncols}",
                bytes.len()
            )));
        }
        // Rows may omit trailing bar columns.
        bytes.resize(ncols, b' ');
        let valid = if file_row % 2 == 1 {
            valid_odd_row(&bytes)
        } else {
            valid_even_row(&bytes)
        };
        if !valid {
            return Err(GridFileError::Format(format!(
                "invalid row {file_row}: \"{line}\""
            )));
        }
        image.push(bytes);
    }

    if flags.mirror {
        mirror_rows(&mut image);
    }
    if image.len() % 2 == 0 {
        return Err(GridFileError::Format(
            "grid file must have an odd number of rows".into(),
        ));
    }
    let size = [image.len() / 2, ncols / 2];
    if size[0] == 0 || size[1] == 0 {
        return Err(GridFileError::Format("grid has no cells".into()));
    }

    let cell = |row: usize, col: usize| image[row * 2 + 1][col * 2 + 1];
    let bar_right: Vec<Vec<bool>> = (0..size[0])
        .map(|i| (0..size[1]).map(|j| image[i * 2 + 1][j * 2 + 2] == b'|').collect())
        .collect();
    let bar_left: Vec<Vec<bool>> = (0..size[0])
        .map(|i| (0..size[1]).map(|j| image[i * 2 + 1][j * 2] == b'|').collect())
        .collect();
    let bar_above: Vec<Vec<bool>> = (0..size[0])
        .map(|i| (0..size[1]).map(|j| image[i * 2][j * 2 + 1] == b'-').collect())
        .collect();
    let bar_below: Vec<Vec<bool>> = (0..size[0])
        .map(|i| (0..size[1]).map(|j| image[i * 2 + 2][j * 2 + 1] == b'-').collect())
        .collect();

    let topo = Topology {
        size,
        wrap: flags.wrap,
        twist: flags.twist,
    };

    let mut grid = Grid::new();
    let mut across: CellTable = vec![vec![None; size[1]]; size[0]];
    let mut down: CellTable = vec![vec![None; size[1]]; size[0]];

    for coord in 0..2 {
        let gap = |a: [usize; 2], b: [usize; 2]| -> bool {
            if coord == 0 {
                bar_right[a[0]][a[1]] || bar_left[b[0]][b[1]]
            } else {
                bar_below[a[0]][a[1]] || bar_above[b[0]][b[1]]
            }
        };
        for line in scan_lines(&topo, coord) {
            for run in barred_runs(&line, &gap) {
                // A lone cell between bars gets no slot in this direction.
                if run.len() < 2 {
                    continue;
                }
                if run.len() > MAX_SLOT_LENGTH {
                    return Err(GridFileError::Format(format!(
                        "slot at ({},{}) is longer than {MAX_SLOT_LENGTH}",
                        run[0][0], run[0][1]
                    )));
                }
                let id = grid.add_slot(run[0][0], run[0][1], coord == 0);
                let table = if coord == 0 { &mut across } else { &mut down };
                for &[row, col] in &run {
                    let pos = grid.slots[id].push_cell();
                    debug_assert!(table[row][col].is_none());
                    table[row][col] = Some((id, pos));
                }
            }
        }
    }
    if grid.slots.len() > MAX_SLOT_COUNT {
        return Err(GridFileError::Format(format!(
            "grid has {} slots; at most {MAX_SLOT_COUNT} are supported",
            grid.slots.len()
        )));
    }

    // Link checked blank cells; apply presets to every covering slot. A
    // cell no slot reaches can never be filled.
    for row in 0..size[0] {
        for col in 0..size[1] {
            let a = across[row][col];
            let d = down[row][col];
            if a.is_none() && d.is_none() {
                return Err(GridFileError::Format(format!(
                    "cell at ({row},{col}) is in no slot"
                )));
            }
            let c = cell(row, col);
            if c.is_ascii_lowercase() {
                if let Some((id, pos)) = a {
                    grid.slots[id].preset_char(pos, c);
                }
                if let Some((id, pos)) = d {
                    grid.slots[id].preset_char(pos, c);
                }
            } else if let (Some((a_id, a_pos)), Some((d_id, d_pos))) = (a, d) {
                grid.add_link(a_id, a_pos, d_id, d_pos);
            }
        }
    }

    Ok((
        grid,
        BarLayout {
            size,
            image,
            across,
            down,
        },
    ))
}

/// Split a line into its maximal runs of cells not separated by bars. A
/// cyclic line with no bar at all is a single ring run anchored at the
/// line's first cell; otherwise a cyclic line is scanned starting just past
/// its first bar.
fn barred_runs(
    line: &Line,
    gap: &impl Fn([usize; 2], [usize; 2]) -> bool,
) -> Vec<Vec<[usize; 2]>> {
    let n = line.cells.len();
    if n == 0 {
        return vec![];
    }
    if !line.cyclic {
        let mut runs = vec![];
        let mut current = vec![line.cells[0]];
        for i in 1..n {
            if gap(line.cells[i - 1], line.cells[i]) {
                runs.push(std::mem::take(&mut current));
            }
            current.push(line.cells[i]);
        }
        runs.push(current);
        return runs;
    }

    let gaps: Vec<bool> = (0..n)
        .map(|i| gap(line.cells[i], line.cells[(i + 1) % n]))
        .collect();
    if !gaps.contains(&true) {
        return vec![line.cells.clone()];
    }
    let first_gap = gaps.iter().position(|&g| g).unwrap();
    let mut runs = vec![];
    let mut current = vec![];
    for k in 0..n {
        let index = (first_gap + 1 + k) % n;
        current.push(line.cells[index]);
        if gaps[index] {
            runs.push(std::mem::take(&mut current));
        }
    }
    debug_assert!(current.is_empty());
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const OPEN_3X3: &str = indoc! {"
        -------
        |. . .|

        |. . .|

        |. . .|
        -------
    "};

    #[test]
    fn test_open_3x3_structure() {
        let (grid, _layout) = build(OPEN_3X3).expect("should parse");
        assert_eq!(grid.slots.len(), 6);
        assert!(grid.slots[..3].iter().all(|s| s.is_across && s.len == 3));
        assert!(grid.slots[3..].iter().all(|s| !s.is_across && s.len == 3));
    }

    #[test]
    fn test_bars_split_slots() {
        let contents = indoc! {"
            -------
            |. .|.|

            |. . .|

            |. . .|
            -------
        "};
        let (grid, _layout) = build(contents).expect("should parse");
        // Row 0 splits into a length-2 slot and a bare cell; the bare cell
        // is covered by its down slot only.
        let row0 = grid
            .slots
            .iter()
            .find(|s| s.is_across && s.row == 0)
            .unwrap();
        assert_eq!((row0.col, row0.len), (0, 2));
        assert!(!grid
            .slots
            .iter()
            .any(|s| s.is_across && s.row == 0 && s.col == 2));
    }

    #[test]
    fn test_presets_apply_to_covering_slots() {
        let contents = indoc! {"
            -------
            |q . .|

            |. . .|

            |. . .|
            -------
        "};
        let (grid, _layout) = build(contents).expect("should parse");
        let row0 = grid
            .slots
            .iter()
            .find(|s| s.is_across && s.row == 0)
            .unwrap();
        assert_eq!(row0.preset_pattern[0], b'q');
        assert!(row0.links[0].is_none());
        assert!(row0.links[1].is_some());
    }

    #[test]
    fn test_horizontal_bars_make_unchecked_cells() {
        let contents = indoc! {"
            -------
             . . .
             -   -
             . . .
             -   -
             . . .
            -------
        "};
        let (grid, _layout) = build(contents).expect("should parse");
        // Three across slots plus the single checked middle column.
        assert_eq!(grid.slots.len(), 4);
        assert_eq!(grid.slots.iter().filter(|s| !s.is_across).count(), 1);
        let down = grid.slots.iter().find(|s| !s.is_across).unwrap();
        assert_eq!((down.row, down.col, down.len), (0, 1, 3));
    }

    #[test]
    fn test_fully_isolated_cell_is_an_error() {
        let contents = indoc! {"
            ---
            |.|
            ---
        "};
        assert!(build(contents).is_err());
    }

    #[test]
    fn test_wrapped_row_without_seam_bar_forms_a_ring() {
        let contents = indoc! {"
            wrap_row
            -------
             q . .
            -------
        "};
        let (grid, _layout) = build(contents).expect("should parse");
        assert_eq!(grid.slots.len(), 1);
        let ring = &grid.slots[0];
        assert!(ring.is_across);
        assert_eq!((ring.row, ring.col, ring.len), (0, 0, 3));
        assert_eq!(ring.preset_pattern[0], b'q');
    }

    #[test]
    fn test_first_row_must_be_solid() {
        assert!(build("--- --\n|. .|\n-----\n").is_err());
        assert!(build("------\n|. .|\n------\n").is_err());
    }

    #[test]
    fn test_cell_row_with_bad_characters_is_an_error() {
        let contents = indoc! {"
            -----
            |. X|
            -----
        "};
        assert!(build(contents).is_err());
    }

    #[test]
    fn test_render_writes_letters_into_the_image() {
        use crate::context::SearchContext;
        use crate::dictionary::Dictionary;

        let contents = indoc! {"
            -----
             a .
            -----
        "};
        let (mut grid, layout) = build(contents).expect("should parse");
        let mut ctx = SearchContext::new(Dictionary::from_words(["ab"]), 0);
        grid.prepare(&mut ctx);
        let rendered = layout.render(&grid);
        assert_eq!(rendered.lines().nth(1).unwrap(), " a _ ");
    }
}
