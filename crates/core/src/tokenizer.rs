//! Path and query tokenizer.
//!
//! Splits on anything that is neither an ASCII alphanumeric nor a Cyrillic
//! letter, lowercases each fragment and also emits its Latin transliteration,
//! so a Ukrainian folder name is reachable from an English keyboard.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static DIMENSIONS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d+(?:[.,]\d+)?(?:\s*[xх×*]\s*\d+(?:[.,]\d+)?)*\s*(?:мм|см|mm|cm)?\b|\b(?:мм|см|mm|cm)\b",
    )
        .expect("dimension pattern is valid")
});

pub fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_cyrillic_letter(c)
}

fn is_cyrillic_letter(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c) && c.is_alphabetic()
}

/// Lowercase tokens and their transliterations, deduplicated in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();

    for fragment in text.split(|c: char| !is_token_char(c)) {
        if fragment.is_empty() {
            continue;
        }

        let lower = fragment.to_lowercase();
        let latin = transliterate(&lower);

        if seen.insert(lower.clone()) {
            tokens.push(lower.clone());
        }
        if !latin.is_empty() && latin != lower && seen.insert(latin.clone()) {
            tokens.push(latin);
        }
    }

    tokens
}

/// Latin rendering of lowercase Cyrillic text. ASCII passes through; signs
/// without a Latin sound (`ь`, `ъ`) and unmapped letters are dropped.
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else if let Some(latin) = cyrillic_to_latin(c) {
            out.push_str(latin);
        }
    }
    out
}

fn cyrillic_to_latin(c: char) -> Option<&'static str> {
    let latin = match c {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'ґ' => "g",
        'д' => "d",
        'е' => "e",
        'є' => "ie",
        'ё' => "io",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'і' => "i",
        'ї' => "i",
        'й' => "i",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ў' => "u",
        'ф' => "f",
        'х' => "kh",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "shch",
        'ы' => "y",
        'э' => "e",
        'ю' => "iu",
        'я' => "ia",
        'ђ' => "d",
        'ѓ' => "g",
        'ѕ' => "dz",
        'ј' => "j",
        'љ' => "lj",
        'њ' => "nj",
        'ћ' => "c",
        'ќ' => "k",
        'џ' => "dz",
        _ => return None,
    };
    Some(latin)
}

/// Strips numbers, `32x20`-style dimensions and length units so they are not
/// mistaken for keywords. Surrounding whitespace is left untouched.
pub fn sanitize_query(text: &str) -> String {
    DIMENSIONS.replace_all(text, "").into_owned()
}
