//! The black-square grid format (NYT-style puzzles): a rectangle of
//! characters where `*` is a blocked cell, `.` or space is an open cell, and
//! a lowercase letter is a preset. By convention every open cell is checked
//! (covered by both an across and a down slot); anything else is a format
//! error.

use crate::builder::{mirror_rows, parse_grid_lines, scan_lines, GridFileError, Line, Topology};
use crate::grid::Grid;
use crate::types::SlotId;
use crate::{MAX_SLOT_COUNT, MAX_SLOT_LENGTH};

type CellTable = Vec<Vec<Option<(SlotId, usize)>>>;

/// The cell geometry needed to render search state back into grid shape.
pub struct BlackSquareLayout {
    pub size: [usize; 2],
    chars: Vec<Vec<u8>>,
    across: CellTable,
}

impl BlackSquareLayout {
    /// Render the (possibly partially filled) grid, one spaced row per line.
    /// Every open cell belongs to an across slot, so rendering the acrosses
    /// covers the grid.
    #[must_use]
    pub fn render(&self, grid: &Grid) -> String {
        let mut out = vec![];
        for row in 0..self.size[0] {
            let cells: Vec<String> = (0..self.size[1])
                .map(|col| match self.across[row][col] {
                    Some((id, pos)) => (grid.slots[id].letter(pos) as char).to_string(),
                    None => "*".to_string(),
                })
                .collect();
            out.push(cells.join(" "));
        }
        out.join("\n")
    }
}

/// Parse black-square grid file contents into a grid plus its layout.
pub fn build(contents: &str) -> Result<(Grid, BlackSquareLayout), GridFileError> {
    let (flags, lines) = parse_grid_lines(contents);
    if lines.is_empty() {
        return Err(GridFileError::Format("grid file has no rows".into()));
    }

    let mut chars: Vec<Vec<u8>> = vec![];
    let ncols = lines[0].len();
    for line in &lines {
        if line.len() != ncols {
            return Err(GridFileError::Format(format!(
                "size mismatch: row \"{line}\" wanted {ncols} columns"
            )));
        }
        for b in line.bytes() {
            if b != b'*' && b != b'.' && b != b' ' && !b.is_ascii_lowercase() {
                return Err(GridFileError::Format(format!(
                    "bad character '{}' in row \"{line}\"",
                    b as char
                )));
            }
        }
        chars.push(line.as_bytes().to_vec());
    }
    if ncols == 0 {
        return Err(GridFileError::Format("grid file has no columns".into()));
    }

    if flags.mirror {
        mirror_rows(&mut chars);
    }
    let size = [chars.len(), ncols];
    let topo = Topology {
        size,
        wrap: flags.wrap,
        twist: flags.twist,
    };

    let mut grid = Grid::new();
    let mut across: CellTable = vec![vec![None; size[1]]; size[0]];
    let mut down: CellTable = vec![vec![None; size[1]]; size[0]];

    for coord in 0..2 {
        for line in scan_lines(&topo, coord) {
            for run in open_runs(&line, &chars) {
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

    // Link the open shared cells pairwise and apply presets to both covering
    // slots.
    for row in 0..size[0] {
        for col in 0..size[1] {
            let c = chars[row][col];
            if c == b'*' {
                continue;
            }
            let (Some((a_id, a_pos)), Some((d_id, d_pos))) = (across[row][col], down[row][col])
            else {
                return Err(GridFileError::Format(format!(
                    "unchecked cell at ({row},{col})"
                )));
            };
            if c.is_ascii_lowercase() {
                grid.slots[a_id].preset_char(a_pos, c);
                grid.slots[d_id].preset_char(d_pos, c);
            } else {
                grid.add_link(a_id, a_pos, d_id, d_pos);
            }
        }
    }

    Ok((
        grid,
        BlackSquareLayout {
            size,
            chars,
            across,
        },
    ))
}

/// Split a line into its maximal runs of open cells. A cyclic line with no
/// block at all is a single ring run anchored at the line's first cell;
/// otherwise a cyclic line is scanned starting just past its first block.
fn open_runs(line: &Line, chars: &[Vec<u8>]) -> Vec<Vec<[usize; 2]>> {
    let blocked: Vec<bool> = line
        .cells
        .iter()
        .map(|&[row, col]| chars[row][col] == b'*')
        .collect();
    let n = line.cells.len();

    if line.cyclic && !blocked.contains(&true) {
        return vec![line.cells.clone()];
    }

    let order: Vec<usize> = if line.cyclic {
        let first_block = blocked.iter().position(|&b| b).unwrap();
        (1..=n).map(|i| (first_block + i) % n).collect()
    } else {
        (0..n).collect()
    };

    let mut runs = vec![];
    let mut current: Vec<[usize; 2]> = vec![];
    for index in order {
        if blocked[index] {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.cells[index]);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[allow(dead_code)]
impl BlackSquareLayout {
    /// The original cell characters (post-mirror), for diagnostics.
    #[must_use]
    pub fn cell_char(&self, row: usize, col: usize) -> u8 {
        self.chars[row][col]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_open_3x3_structure() {
        let (grid, _layout) = build("...\n...\n...\n").expect("should parse");
        assert_eq!(grid.slots.len(), 6);
        assert!(grid.slots[..3].iter().all(|s| s.is_across && s.len == 3));
        assert!(grid.slots[3..].iter().all(|s| !s.is_across && s.len == 3));

        // The center cell links row 1 to column 1.
        let across_mid = &grid.slots[1];
        let link = across_mid.links[1].expect("center cell should be linked");
        assert_eq!(link.other_slot, 4);
        assert_eq!(link.other_pos, 1);
    }

    #[test]
    fn test_blocks_split_slots_and_presets_apply() {
        let template = indoc! {"
            ab*
            ..*
            ...
        "};
        let (grid, _layout) = build(template).expect("should parse");

        // Across: (0,0) len 2, (1,0) len 2, (2,0) len 3.
        // Down: (0,0) len 3, (0,1) len 3, and the lone open cell at (2,2).
        assert_eq!(grid.slots.len(), 6);
        let first = &grid.slots[0];
        assert_eq!((first.row, first.col, first.len), (0, 0, 2));
        assert_eq!(&first.preset_pattern[..], b"ab");

        let down_first = grid
            .slots
            .iter()
            .find(|s| !s.is_across && s.col == 0)
            .unwrap();
        assert_eq!(down_first.preset_pattern[0], b'a');
        // Preset cells carry no links.
        assert!(down_first.links[0].is_none());
        assert!(down_first.links[1].is_some());
    }

    #[test]
    fn test_space_counts_as_open_cell() {
        let (grid, _layout) = build(". .\n...\n...\n").expect("should parse");
        assert_eq!(grid.slots.len(), 6);
        assert!(grid.slots[0].links[1].is_some());
    }

    #[test]
    fn test_mirror_appends_rotation() {
        let template = indoc! {"
            mirror
            .*
            ..
        "};
        let (grid, layout) = build(template).expect("should parse");
        assert_eq!(layout.size, [3, 2]);
        // Row 2 is row 0 rotated 180 degrees.
        assert_eq!(layout.cell_char(2, 0), b'*');
        assert_eq!(layout.cell_char(2, 1), b'.');
        assert!(!grid.slots.is_empty());
    }

    #[test]
    fn test_wrapped_open_row_forms_a_ring() {
        let template = indoc! {"
            wrap_row
            q..
        "};
        let (grid, _layout) = build(template).expect("should parse");
        let ring = &grid.slots[0];
        assert!(ring.is_across);
        assert_eq!((ring.row, ring.col, ring.len), (0, 0, 3));
        assert_eq!(ring.preset_pattern[0], b'q');
        // Each column still has its one-cell down slot.
        assert_eq!(grid.slots.len(), 4);
    }

    #[test]
    fn test_wrapped_row_with_block_wraps_past_the_edge() {
        let template = indoc! {"
            wrap_row
            .*..
            ....
        "};
        let (grid, _layout) = build(template).expect("should parse");
        // Row 0 has one across slot of length 3: cols 2, 3, then wrapping
        // to col 0.
        let slot = grid
            .slots
            .iter()
            .find(|s| s.is_across && s.row == 0)
            .unwrap();
        assert_eq!((slot.col, slot.len), (2, 3));
    }

    #[test]
    fn test_row_length_mismatch_is_an_error() {
        assert!(build("...\n..\n").is_err());
    }

    #[test]
    fn test_bad_character_is_an_error() {
        assert!(build("..X\n...\n").is_err());
    }

    #[test]
    fn test_render_shows_blocks_and_presets() {
        use crate::context::SearchContext;
        use crate::dictionary::Dictionary;

        let (mut grid, layout) = build("a.*\n...\n...\n").expect("should parse");
        let mut ctx = SearchContext::new(Dictionary::from_words(["ab", "abc"]), 0);
        grid.prepare(&mut ctx);

        let rendered = layout.render(&grid);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "a _ *");
    }
}
