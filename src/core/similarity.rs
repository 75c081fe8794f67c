//! Text similarity for comparing file names with catalog titles.
//!
//! Two strategies are combined: a character-level matching-block ratio and a
//! token-level one where every CJK character is a token of its own, so that
//! a Japanese title is not drowned out by a long romanized suffix.

/// A run of `len` equal items at `a[a_start..]` and `b[b_start..]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub len: usize,
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a`
/// on ties.
fn longest_match<T: PartialEq>(
    a: &[T],
    b: &[T],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> MatchingBlock {
    let mut best = MatchingBlock {
        a_start: alo,
        b_start: blo,
        len: 0,
    };
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo;
            if a[i] == b[j] {
                let run = prev[col] + 1;
                cur[col + 1] = run;
                if run > best.len {
                    best = MatchingBlock {
                        a_start: i + 1 - run,
                        b_start: j + 1 - run,
                        len: run,
                    };
                }
            } else {
                cur[col + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Ratcliff/Obershelp matching blocks: take the longest common block, then
/// recurse on both sides of it. Blocks come back ordered by position.
pub fn matching_blocks<T: PartialEq>(a: &[T], b: &[T]) -> Vec<MatchingBlock> {
    let mut blocks = Vec::new();
    let mut pending = vec![((0, a.len()), (0, b.len()))];

    while let Some((ra, rb)) = pending.pop() {
        if ra.0 >= ra.1 || rb.0 >= rb.1 {
            continue;
        }
        let block = longest_match(a, b, ra, rb);
        if block.len == 0 {
            continue;
        }
        blocks.push(block);
        pending.push(((ra.0, block.a_start), (rb.0, block.b_start)));
        pending.push((
            (block.a_start + block.len, ra.1),
            (block.b_start + block.len, rb.1),
        ));
    }

    blocks.sort_by_key(|block| (block.a_start, block.b_start));
    blocks
}

fn matched_len<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    matching_blocks(a, b).iter().map(|block| block.len).sum()
}

/// Symmetric character ratio `2·M / (|a| + |b|)` over the lowercased
/// strings. Whitespace counts like any other character.
pub fn raw_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let matched = matched_len(&a, &b);
    (2 * matched) as f64 / (a.len() + b.len()) as f64
}

/// Split into lowercase ASCII alphanumeric words plus one token per
/// non-ASCII character. ASCII punctuation and whitespace only separate.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            word.push(c.to_ascii_lowercase());
            continue;
        }
        if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
        if !c.is_ascii() && !c.is_whitespace() {
            tokens.extend(c.to_lowercase().map(String::from));
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }

    tokens
}

/// Share of `a`'s tokens that line up, in order, with tokens of `b`.
/// Directional: `a` is the local name, `b` the candidate.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let a = tokenize(a);
    let b = tokenize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    matched_len(&a, &b) as f64 / a.len() as f64
}

/// Combined score in [0, 1].
///
/// A one-character name only gets the raw ratio; otherwise a single shared
/// CJK character would count as a perfect token match.
pub fn hybrid_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let raw = raw_similarity(a, b);
    if a.chars().count() < 2 {
        return raw;
    }
    raw.max(token_similarity(a, b)).min(1.0)
}
