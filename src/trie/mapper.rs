//! Token-id mapping for trie queries, with optional context remapping.
//!
//! With remapping order r >= 1, the token closing a k-gram (k > r + 1) is
//! stored not as its vocabulary id but as its position among the sorted
//! children of its length-r context. The context path itself is always
//! resolved through raw ids, because the orders it touches (<= r + 1) are
//! never remapped.

use crate::sequences::{GramSequence, RankSequence};
use crate::MAX_ORDER;

use super::SortedArray;

/// Resolve the tokens of a forward-trie query into the ids stored in
/// `grams_k`: raw vocabulary ids, remapped to sibling positions where the
/// remapping order asks for it. Returns the order minus one, or `None` as
/// soon as a token is unknown or a context is absent.
pub(crate) fn map_query<G, R, F>(
    gram: &str,
    vocab_id: F,
    arrays: &[SortedArray<G, R>],
    remapping_order: u8,
    word_ids: &mut [u64; MAX_ORDER as usize],
) -> Option<usize>
where
    G: GramSequence,
    R: RankSequence,
    F: Fn(&str) -> Option<u64>,
{
    let mut raw = [0u64; MAX_ORDER as usize];
    let mut k = 0usize;
    for token in gram.split_ascii_whitespace() {
        if k == MAX_ORDER as usize {
            return None;
        }
        raw[k] = vocab_id(token)?;
        k += 1;
    }
    if k == 0 {
        return None;
    }

    for t in 0..k {
        word_ids[t] = if remapping_order > 0 && t > remapping_order as usize {
            remap_forward(raw[t], &raw, t, arrays, remapping_order)?
        } else {
            raw[t]
        };
    }
    Some(k - 1)
}

/// Sibling position of `id` within the children of its preceding length-r
/// context (forward trie). `raw[t]` is the raw id of the gram's t-th
/// token; `t` indexes the token being remapped.
pub(crate) fn remap_forward<G, R>(
    id: u64,
    raw: &[u64],
    t: usize,
    arrays: &[SortedArray<G, R>],
    remapping_order: u8,
) -> Option<u64>
where
    G: GramSequence,
    R: RankSequence,
{
    debug_assert!(t > remapping_order as usize);
    let r = remapping_order as usize;
    let mut range = arrays[0].range(raw[t - r]);
    if r == 2 {
        arrays[1].next(&mut range, raw[t - 1])?;
    }
    let pos = arrays[r].position(range, id)?;
    Some(pos - range.begin)
}

/// Sibling position of `id` within the children of its following length-r
/// context (reversed trie; used while building from suffix-sorted input).
/// `raw` holds the gram's raw token ids in natural order and `id` is the
/// raw id of the first token.
pub(crate) fn remap_backward<G, R>(
    id: u64,
    raw: &[u64],
    arrays: &[SortedArray<G, R>],
    remapping_order: u8,
) -> Option<u64>
where
    G: GramSequence,
    R: RankSequence,
{
    let r = remapping_order as usize;
    let mut range = arrays[0].range(raw[r]);
    if r == 2 {
        arrays[1].next(&mut range, raw[1])?;
    }
    let pos = arrays[r].position(range, id)?;
    Some(pos - range.begin)
}

/// Remapping along the scoring walk, where the context arrives as the two
/// previously consumed word ids instead of a gram string.
pub(crate) fn remap_state<G, R>(
    prev_id: u64,
    prev_prev_id: u64,
    id: u64,
    arrays: &[SortedArray<G, R>],
    remapping_order: u8,
) -> Option<u64>
where
    G: GramSequence,
    R: RankSequence,
{
    let r = remapping_order as usize;
    let range = if r == 1 {
        arrays[0].range(prev_id)
    } else {
        let mut range = arrays[0].range(prev_prev_id);
        arrays[1].next(&mut range, prev_id)?;
        range
    };
    let pos = arrays[r].position(range, id)?;
    Some(pos - range.begin)
}
