/// Separator between resource code segments, root to leaf
pub const SEGMENT_SEPARATOR: char = ':';

/// Whether holding `held` authorizes `required`.
///
/// A code grants itself and every code below it in the hierarchy: `project`
/// grants `project:add` but not `projectX`. Matching is exact and case-sensitive.
pub fn grants(held: &str, required: &str) -> bool {
    if held == required {
        return true;
    }
    required
        .strip_prefix(held)
        .is_some_and(|rest| rest.starts_with(SEGMENT_SEPARATOR))
}

/// True when any of `held` grants `required`
pub fn any_grants<I, S>(held: I, required: &str) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    held.into_iter().any(|code| grants(code.as_ref(), required))
}
