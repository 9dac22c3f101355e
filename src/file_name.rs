/// Validates a served-file name.
///
/// A valid name is:
/// - Non-empty
/// - Made only of ASCII letters, digits and `.`
/// - Not made only of `.` characters (rejects `.`, `..`, `...`)
///
/// Path separators can never pass, so a valid name always stays inside the
/// served directory.
#[must_use]
pub fn is_valid_file_name(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
        && !s.chars().all(|c| c == '.')
}
