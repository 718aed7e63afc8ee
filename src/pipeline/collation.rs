//! Vietnamese collation for name sorting.
//!
//! Primary order follows the Vietnamese alphabet, where `ă â đ ê ô ơ ư` are
//! letters of their own. Tone marks only break ties between names with the
//! same letters, in the order: none, grave, hook, tilde, acute, dot below.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const ALPHABET: &[char] = &[
    'a', 'ă', 'â', 'b', 'c', 'd', 'đ', 'e', 'ê', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n',
    'o', 'ô', 'ơ', 'p', 'q', 'r', 's', 't', 'u', 'ư', 'v', 'w', 'x', 'y', 'z',
];

// Above every code point, so letters sort after digits, spaces and symbols.
const LETTER_BASE: u32 = 0x11_0000;

const BREVE: char = '\u{0306}';
const CIRCUMFLEX: char = '\u{0302}';
const HORN: char = '\u{031B}';

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CollationKey {
    primary: Vec<u32>,
    tones: Vec<u8>,
    original: String,
}

pub fn collation_key(input: &str) -> CollationKey {
    let mut letters: Vec<char> = Vec::with_capacity(input.len());
    let mut tones: Vec<u8> = Vec::with_capacity(input.len());

    for c in input.nfd() {
        if is_combining_mark(c) {
            if let Some(tone) = tone_rank(c) {
                if let Some(last) = tones.last_mut() {
                    *last = tone;
                }
            } else if let Some(last) = letters.last_mut() {
                *last = apply_modifier(*last, c);
            }
            continue;
        }
        for lower in c.to_lowercase() {
            letters.push(lower);
            tones.push(0);
        }
    }

    CollationKey {
        primary: letters.into_iter().map(weight).collect(),
        tones,
        original: input.to_string(),
    }
}

pub fn compare(a: &str, b: &str) -> Ordering {
    collation_key(a).cmp(&collation_key(b))
}

/// Lowercase, strip diacritics and map `đ` to `d`.
pub fn fold_diacritics(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect()
}

fn tone_rank(mark: char) -> Option<u8> {
    match mark {
        '\u{0300}' => Some(1),
        '\u{0309}' => Some(2),
        '\u{0303}' => Some(3),
        '\u{0301}' => Some(4),
        '\u{0323}' => Some(5),
        _ => None,
    }
}

fn apply_modifier(base: char, mark: char) -> char {
    match (base, mark) {
        ('a', BREVE) => 'ă',
        ('a', CIRCUMFLEX) => 'â',
        ('e', CIRCUMFLEX) => 'ê',
        ('o', CIRCUMFLEX) => 'ô',
        ('o', HORN) => 'ơ',
        ('u', HORN) => 'ư',
        _ => base,
    }
}

fn weight(c: char) -> u32 {
    match ALPHABET.iter().position(|letter| *letter == c) {
        Some(index) => LETTER_BASE + index as u32,
        None => c as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut out: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        out.sort_by(|a, b| compare(a, b));
        out
    }

    #[test]
    fn sorts_names_by_vietnamese_alphabet() {
        assert_eq!(
            sorted(&["Nguyễn B", "An C", "Bình A"]),
            vec!["An C", "Bình A", "Nguyễn B"]
        );
    }

    #[test]
    fn modified_vowels_are_separate_letters() {
        assert_eq!(sorted(&["Ân", "Ăn", "Anh"]), vec!["Anh", "Ăn", "Ân"]);
        assert_eq!(sorted(&["Đào", "Dũng", "Em"]), vec!["Dũng", "Đào", "Em"]);
        assert_eq!(sorted(&["Ưng", "Uyên", "Vy"]), vec!["Uyên", "Ưng", "Vy"]);
    }

    #[test]
    fn tones_only_break_ties() {
        assert_eq!(
            sorted(&["Mạ", "Má", "Mã", "Mả", "Mà", "Ma"]),
            vec!["Ma", "Mà", "Mả", "Mã", "Má", "Mạ"]
        );
        assert_eq!(sorted(&["Mà B", "Ma C"]), vec!["Mà B", "Ma C"]);
    }

    #[test]
    fn case_does_not_change_primary_order() {
        assert_eq!(sorted(&["bình", "An"]), vec!["An", "bình"]);
    }

    #[test]
    fn folding_strips_marks() {
        assert_eq!(fold_diacritics("Lớp Trưởng"), "lop truong");
        assert_eq!(fold_diacritics("ĐẶNG"), "dang");
    }
}
