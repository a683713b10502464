//! Bit-parallel Levenshtein distance.
//!
//! Myers' algorithm in Hyyrö's formulation: the shorter string is the pattern,
//! encoded as one match mask per character, and the DP column is carried as
//! vertical delta vectors `pv`/`mv` packed into 64-bit words. Patterns up to
//! 64 characters run in a single word; longer ones are split into blocks with
//! the horizontal delta carried from block to block.

use std::collections::HashMap;

const WORD_BITS: usize = 64;

/// Match masks for one 64-character block of the pattern.
struct MatchMasks {
    latin: [u64; 256],
    other: HashMap<char, u64>,
}

impl MatchMasks {
    fn new() -> Self {
        Self { latin: [0; 256], other: HashMap::new() }
    }

    #[inline]
    fn set(&mut self, c: char, bit: u64) {
        let code = c as u32;
        if code < 256 {
            self.latin[code as usize] |= bit;
        } else {
            *self.other.entry(c).or_insert(0) |= bit;
        }
    }

    #[inline]
    fn get(&self, c: char) -> u64 {
        let code = c as u32;
        if code < 256 {
            self.latin[code as usize]
        } else {
            self.other.get(&c).copied().unwrap_or(0)
        }
    }
}

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`. Counts Unicode scalar values.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    edit_distance_chars(&a, &b)
}

pub fn edit_distance_chars(a: &[char], b: &[char]) -> usize {
    let (pattern, text) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if pattern.is_empty() {
        return text.len();
    }
    if pattern.len() <= WORD_BITS {
        single_word(pattern, text)
    } else {
        blocked(pattern, text)
    }
}

/// Nearest candidate to `word` and its distance. The first candidate reaching
/// the minimum wins.
pub fn closest<'a, I>(word: &str, candidates: I) -> Option<(&'a str, usize)>
where
    I: IntoIterator<Item = &'a str>,
{
    let target: Vec<char> = word.chars().collect();
    let mut buf: Vec<char> = Vec::new();
    let mut best: Option<(&'a str, usize)> = None;
    for cand in candidates {
        buf.clear();
        buf.extend(cand.chars());
        let d = edit_distance_chars(&target, &buf);
        if best.map_or(true, |(_, bd)| d < bd) {
            best = Some((cand, d));
            if d == 0 {
                break;
            }
        }
    }
    best
}

fn single_word(pattern: &[char], text: &[char]) -> usize {
    let mut peq = MatchMasks::new();
    for (i, &c) in pattern.iter().enumerate() {
        peq.set(c, 1u64 << i);
    }
    let last = 1u64 << (pattern.len() - 1);

    let mut pv = !0u64;
    let mut mv = 0u64;
    let mut score = pattern.len();
    for &c in text {
        let eq = peq.get(c);
        let xv = eq | mv;
        let xh = ((eq & pv).wrapping_add(pv) ^ pv) | eq;
        let mut ph = mv | !(xh | pv);
        let mut mh = pv & xh;
        if ph & last != 0 {
            score += 1;
        }
        if mh & last != 0 {
            score -= 1;
        }
        ph = (ph << 1) | 1;
        mh <<= 1;
        pv = mh | !(xv | ph);
        mv = ph & xv;
    }
    score
}

fn blocked(pattern: &[char], text: &[char]) -> usize {
    let n = pattern.len();
    let blocks = (n + WORD_BITS - 1) / WORD_BITS;
    let mut peq: Vec<MatchMasks> = (0..blocks).map(|_| MatchMasks::new()).collect();
    for (i, &c) in pattern.iter().enumerate() {
        peq[i / WORD_BITS].set(c, 1u64 << (i % WORD_BITS));
    }

    let mut pv = vec![!0u64; blocks];
    let mut mv = vec![0u64; blocks];
    let high = 1u64 << (WORD_BITS - 1);
    let last = 1u64 << ((n - 1) % WORD_BITS);
    let mut score = n;

    for &c in text {
        // the top boundary row grows by one per column
        let mut carry: i8 = 1;
        for b in 0..blocks {
            let out = if b + 1 == blocks { last } else { high };
            carry = advance_block(&mut pv[b], &mut mv[b], peq[b].get(c), carry, out);
        }
        match carry {
            1 => score += 1,
            -1 => score -= 1,
            _ => {}
        }
    }
    score
}

/// One column step for one block. `hin` is the horizontal delta entering the
/// block's top row; the return value is the delta at the `out` row.
#[inline]
fn advance_block(pv: &mut u64, mv: &mut u64, eq: u64, hin: i8, out: u64) -> i8 {
    let xv = eq | *mv;
    let eq = if hin < 0 { eq | 1 } else { eq };
    let xh = ((eq & *pv).wrapping_add(*pv) ^ *pv) | eq;
    let mut ph = *mv | !(xh | *pv);
    let mut mh = *pv & xh;
    let hout = if ph & out != 0 {
        1
    } else if mh & out != 0 {
        -1
    } else {
        0
    };
    ph <<= 1;
    mh <<= 1;
    if hin < 0 {
        mh |= 1;
    } else if hin > 0 {
        ph |= 1;
    }
    *pv = mh | !(xv | ph);
    *mv = ph & xv;
    hout
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        let mut prev: Vec<usize> = (0..=b.len()).collect();
        let mut cur = vec![0; b.len() + 1];
        for i in 1..=a.len() {
            cur[0] = i;
            for j in 1..=b.len() {
                let sub = prev[j - 1] + usize::from(a[i - 1] != b[j - 1]);
                cur[j] = sub.min(prev[j] + 1).min(cur[j - 1] + 1);
            }
            std::mem::swap(&mut prev, &mut cur);
        }
        prev[b.len()]
    }

    // deterministic pseudo-random strings over a small alphabet
    fn gen(seed: &mut u64, len: usize, alphabet: &[char]) -> String {
        (0..len)
            .map(|_| {
                *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                alphabet[((*seed >> 33) as usize) % alphabet.len()]
            })
            .collect()
    }

    #[test]
    fn known_distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("sitting", "kitten"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("flaw", "lawn"), 2);
        assert_eq!(edit_distance("liaså", "likaså"), 1);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn single_word_matches_reference() {
        let alphabet = ['a', 'b', 'c', 'å', 'ö'];
        let mut seed = 7;
        for _ in 0..300 {
            let la = (seed % 40) as usize;
            let a = gen(&mut seed, la, &alphabet);
            let lb = (seed % 40) as usize;
            let b = gen(&mut seed, lb, &alphabet);
            assert_eq!(edit_distance(&a, &b), reference(&a, &b), "{a} / {b}");
        }
    }

    #[test]
    fn full_word_pattern() {
        let a = "a".repeat(64);
        let mut b = a.clone();
        b.replace_range(10..11, "b");
        assert_eq!(edit_distance(&a, &b), 1);
        assert_eq!(edit_distance(&a, &format!("{a}x")), 1);
    }

    #[test]
    fn blocked_matches_reference() {
        let alphabet = ['x', 'y', 'z', 'ä'];
        let mut seed = 42;
        for round in 0..60 {
            let la = 65 + (round * 7) % 120;
            let a = gen(&mut seed, la, &alphabet);
            let lb = la + (round % 30);
            let b = gen(&mut seed, lb, &alphabet);
            assert_eq!(edit_distance(&a, &b), reference(&a, &b), "round {round}");
        }
    }

    #[test]
    fn blocked_near_identical() {
        let a: String = "abcdefghij".repeat(15);
        let mut b = a.clone();
        b.remove(70);
        b.insert(140, 'q');
        assert_eq!(edit_distance(&a, &b), reference(&a, &b));
        assert_eq!(edit_distance(&a, &a), 0);
    }

    #[test]
    fn closest_prefers_first_minimum() {
        let words = ["bake", "cake", "lake"];
        let (w, d) = closest("fake", words.iter().copied()).unwrap();
        assert_eq!((w, d), ("bake", 1));
        assert!(closest("fake", std::iter::empty()).is_none());
    }
}
