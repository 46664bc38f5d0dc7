// Context assembly
// Packs rank-ordered passages into a character budget


/// Characters reserved per accepted passage for separators
pub const SEPARATOR_ALLOWANCE: usize = 2;

/// Build a context from rank-ordered passages under a `max_len` budget.
///
/// Each passage is trimmed and costs its length in characters plus
/// [`SEPARATOR_ALLOWANCE`]. Accumulation stops at the first passage that
/// would push the running total past `max_len`; that passage and every
/// later one are dropped. Accepted passages are joined with `\n`.
///
/// A first passage that alone exceeds the budget yields an empty context.
/// It is dropped rather than truncated.
#[inline]
pub fn construct_context<S: AsRef<str>>(passages: &[S], max_len: usize) -> String {
    let mut chosen: Vec<&str> = Vec::new();
    let mut used = 0_usize;

    for passage in passages {
        let text = passage.as_ref().trim();
        used += text.chars().count() + SEPARATOR_ALLOWANCE;
        if used > max_len {
            break;
        }
        chosen.push(text);
    }

    chosen.join("\n")
}
