//! Property-based tests for the cleaner and splitter.

use proptest::prelude::*;

use legalrag_core::cleaner::clean;
use legalrag_core::splitter::TextSplitter;

fn noisy_token() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Page 12".to_string()),
        Just("p. 3".to_string()),
        Just("--- PAGE BREAK ---".to_string()),
        Just("....".to_string()),
        Just("__".to_string()),
        Just("\n".to_string()),
        Just("\r\n".to_string()),
        Just("\t".to_string()),
        Just("  ".to_string()),
        Just("7".to_string()),
        "[A-Za-z]",
        "[a-z]{2,8}",
        "[0-9]{1,5}",
    ]
}

fn noisy_text() -> impl Strategy<Value = String> {
    proptest::collection::vec(noisy_token(), 0..60).prop_map(|tokens| tokens.join(" "))
}

proptest! {
    #[test]
    fn clean_is_idempotent_on_noisy_text(text in noisy_text()) {
        let once = clean(&text);
        prop_assert_eq!(clean(&once), once);
    }

    #[test]
    fn clean_is_idempotent_on_arbitrary_text(text in "\\PC{0,300}") {
        let once = clean(&text);
        prop_assert_eq!(clean(&once), once);
    }

    #[test]
    fn split_covers_input_with_exact_overlap(
        text in "[a-z .\n]{0,400}",
        chunk_size in 1usize..60,
        overlap_seed in 0usize..60,
    ) {
        let overlap = overlap_seed % chunk_size;
        let chunks = TextSplitter::new(chunk_size, overlap).unwrap().split(&text);
        let total = text.chars().count();

        if total == 0 {
            prop_assert!(chunks.is_empty());
        } else if total <= chunk_size {
            prop_assert_eq!(chunks.len(), 1);
        }

        let mut rebuilt = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            let len = chunk.chars().count();
            prop_assert!(len > 0);
            prop_assert!(len <= chunk_size);
            if i == 0 {
                rebuilt.push_str(chunk);
            } else {
                let prev: Vec<char> = chunks[i - 1].chars().collect();
                let head: String = chunk.chars().take(overlap).collect();
                let tail: String = prev[prev.len() - overlap..].iter().collect();
                prop_assert_eq!(head, tail);
                rebuilt.extend(chunk.chars().skip(overlap));
            }
        }
        prop_assert_eq!(rebuilt, text);
    }
}
