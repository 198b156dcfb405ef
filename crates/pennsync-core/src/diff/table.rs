// Parser for the box-drawn table printed by `map diff`.
//
//   +------+-----------+--------+
//   | PATH | FILE NAME | UPDATE |
//   +------+-----------+--------+
//   | sub1 | t1.nii.gz | ADDED  |
//   +------+-----------+--------+

/// Raw cells of a diff table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffTable {
    /// Header cells; empty when no header line was found.
    pub headers: Vec<String>,
    /// Data rows, each with exactly `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
    /// Rows discarded because their cell count did not match the header.
    pub dropped: usize,
}

impl DiffTable {
    pub fn has_header(&self) -> bool {
        !self.headers.is_empty()
    }
}

// Header detection requires the spaced `FILE NAME`, while `Columns::resolve`
// also accepts `FILENAME` once a header is found. A `FILENAME`-only table is
// therefore treated as having no header. Keep both sides as they are.
fn is_header(line: &str) -> bool {
    let upper = line.to_uppercase();
    upper.contains("FILE NAME") && upper.contains("PATH")
}

/// Split `| a | b |` into `["a", "b"]`, dropping the boundary cells.
fn split_cells(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 2 {
        return Vec::new();
    }
    parts[1..parts.len() - 1]
        .iter()
        .map(|cell| cell.trim().to_owned())
        .collect()
}

/// Parse the tool's stdout into header and rows.
///
/// Lines before the header are ignored, as are blank lines, border lines
/// starting with `+` and repeated headers. Output without a header yields
/// an empty table.
pub fn parse_table(output: &str) -> DiffTable {
    let mut table = DiffTable::default();

    for line in output.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('+') {
            continue;
        }

        if !table.has_header() {
            if is_header(line) {
                table.headers = split_cells(line);
            }
            continue;
        }

        if !line.contains('|') || is_header(line) {
            continue;
        }

        let cells = split_cells(line);
        if cells.len() == table.headers.len() {
            table.rows.push(cells);
        } else {
            table.dropped += 1;
        }
    }

    table
}
