//! Property tests for the Hangman display helpers.

use std::collections::BTreeSet;

use huddle_games::hangman::{PLACEHOLDER, obfuscate};
use proptest::prelude::*;

/// Words made of letters, spaces and a little punctuation.
fn word() -> impl Strategy<Value = String> {
    "[A-Z][A-Z ,.'!-]{0,30}"
}

fn revealed() -> impl Strategy<Value = BTreeSet<char>> {
    prop::collection::btree_set(prop::char::range('A', 'Z'), 0..26)
}

proptest! {
    #[test]
    fn test_obfuscate_reveals_exactly_revealed_letters_and_non_letters(
        word in word(),
        revealed in revealed(),
    ) {
        let shown = obfuscate(&word, &revealed);
        let shown_chars: Vec<char> = shown.text.chars().collect();
        let word_chars: Vec<char> = word.chars().collect();
        prop_assert_eq!(shown_chars.len(), word_chars.len());

        for (original, displayed) in word_chars.iter().zip(&shown_chars) {
            let visible = !original.is_ascii_alphabetic() || revealed.contains(original);
            if visible {
                prop_assert_eq!(displayed, original);
            } else {
                prop_assert_eq!(*displayed, PLACEHOLDER);
            }
        }
    }

    #[test]
    fn test_obfuscate_blanks_count_hidden_letters(word in word(), revealed in revealed()) {
        let shown = obfuscate(&word, &revealed);
        let hidden = word
            .chars()
            .filter(|c| c.is_ascii_alphabetic() && !revealed.contains(c))
            .count();
        prop_assert_eq!(shown.blanks, hidden);
    }

    #[test]
    fn test_obfuscate_with_every_letter_revealed_equals_word(word in word()) {
        let all: BTreeSet<char> = ('A'..='Z').collect();
        let shown = obfuscate(&word, &all);
        prop_assert_eq!(shown.text, word);
        prop_assert_eq!(shown.blanks, 0);
    }
}
