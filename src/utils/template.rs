//! Command text normalisation.

/// Collapse multi-line command text onto a single line.
///
/// Remote commands are executed one line at a time, so any template written
/// across several lines has its whitespace runs (newlines included) folded
/// into single spaces.
pub fn on_one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
