//! Normalization of raw extracted document text.
//!
//! The individual rules interact: removing a page label can leave two
//! single-letter tokens next to each other, merging letters can produce a
//! new `Page 3` label, and so on. [`clean`] therefore applies one pass of
//! all rules repeatedly until the text stops changing, which makes it
//! idempotent.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of single letters shorter than this are left alone ("a I", "A B").
pub const MIN_SPACED_RUN: usize = 3;

static PAGE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)---\s*page\s*break\s*---").expect("page break pattern"));
static PAGE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:page|py|p)\s*\d+\b").expect("page label pattern"));
static PAGE_LABEL_DOTTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bp\.\s*\d+\b").expect("dotted page label pattern"));
static PUNCT_NOISE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[._,\-~]{3,}").expect("punctuation noise pattern"));
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("horizontal whitespace pattern"));
static PAGE_NUMBER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-–]?\s*\d{1,4}\s*[-–]?$").expect("page number line pattern"));

/// Clean raw document text. Deterministic and idempotent.
pub fn clean(raw: &str) -> String {
    let mut current = clean_pass(raw);
    // Apart from the one-off rewrites of `\r` and non-space whitespace,
    // every pass that changes the text makes it strictly shorter.
    loop {
        let next = clean_pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn clean_pass(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = PAGE_BREAK.replace_all(&text, " ");
    let text = PAGE_LABEL.replace_all(&text, " ");
    let text = PAGE_LABEL_DOTTED.replace_all(&text, " ");
    let text = PUNCT_NOISE.replace_all(&text, " ");

    let lines: Vec<String> = text
        .split('\n')
        .map(merge_spaced_letters)
        .map(|line| HORIZONTAL_WS.replace_all(&line, " ").trim().to_string())
        .filter(|line| !line.is_empty() && !PAGE_NUMBER_LINE.is_match(line))
        .collect();
    lines.join("\n")
}

/// Merge letter-spaced words: "A a d h a a r" -> "Aadhaar".
///
/// Only tokens separated by exactly one space are considered, and every
/// token in the run must be a single letter.
fn merge_spaced_letters(line: &str) -> String {
    let tokens: Vec<&str> = line.split(' ').collect();
    let is_letter = |t: &str| {
        let mut chars = t.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    };

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if is_letter(tokens[i]) {
            let run_end = tokens[i..].iter().position(|t| !is_letter(t)).map_or(tokens.len(), |p| i + p);
            if run_end - i >= MIN_SPACED_RUN {
                out.push(tokens[i..run_end].concat());
            } else {
                out.extend(tokens[i..run_end].iter().map(|t| (*t).to_string()));
            }
            i = run_end;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}
