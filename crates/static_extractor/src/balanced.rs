/// A bracketed region of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancedGroup<'a> {
    /// Everything between the outer pair, exclusive.
    pub inner: &'a str,
    /// Byte index just past the closing bracket.
    pub end: usize,
}

fn closer(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

/// Matches the bracket `input` starts with against its closing partner,
/// tracking all three bracket kinds on one stack.
///
/// Returns `None` when `input` does not start with a bracket, a closer does not
/// match the innermost opener, or the input ends first.
pub fn balanced_group(input: &str) -> Option<BalancedGroup<'_>> {
    let mut chars = input.char_indices();
    let (_, first) = chars.next()?;
    let mut stack = vec![closer(first)?];

    for (idx, c) in chars {
        if let Some(expected) = closer(c) {
            stack.push(expected);
        } else if matches!(c, ')' | ']' | '}') {
            if stack.pop()? != c {
                return None;
            }
            if stack.is_empty() {
                return Some(BalancedGroup {
                    inner: &input[first.len_utf8()..idx],
                    end: idx + c.len_utf8(),
                });
            }
        }
    }
    None
}
