/// Calculates the 1-based line and column number for a given byte position
/// in the source text. Only called when rendering diagnostics, so a linear
/// scan is fine.
#[must_use]
pub fn get_line_and_column(source: &str, position: usize) -> (usize, usize) {
    let mut line = 1;
    let mut column = 1;
    for (i, c) in source.char_indices() {
        if i >= position {
            break;
        }
        if c == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    (line, column)
}
