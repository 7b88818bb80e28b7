//! Character-level tokenizer.
//!
//! Each character maps to `code_point mod vocab_size`. This is a placeholder
//! scheme, not sub-word tokenization: many characters collide, and decoding
//! goes through the model's vocabulary table rather than inverting the map.

/// Token id.
pub type TokenId = u32;

/// Encode `text`, keeping only its trailing `window` characters.
pub fn encode(text: &str, vocab_size: usize, window: usize) -> Vec<TokenId> {
    let vocab = vocab_size as u32;
    let ids: Vec<TokenId> = text.chars().map(|c| c as u32 % vocab).collect();
    let start = ids.len().saturating_sub(window);
    ids[start..].to_vec()
}

/// Decode ids through the vocabulary table. Ids outside the table are
/// skipped.
pub fn decode(vocab: &[String], ids: &[TokenId]) -> String {
    ids.iter()
        .filter_map(|&id| vocab.get(id as usize))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_wraps_code_points() {
        assert_eq!(encode("Ab", 2048, 16), vec![65, 98]);
        // U+3053 'こ' = 12371, 12371 % 2048 = 83
        assert_eq!(encode("こ", 2048, 16), vec![83]);
    }

    #[test]
    fn test_encode_keeps_trailing_window() {
        assert_eq!(encode("abcdef", 256, 3), vec![100, 101, 102]);
        assert!(encode("", 256, 3).is_empty());
    }

    #[test]
    fn test_decode_skips_out_of_range() {
        let vocab = vec!["".to_string(), "".to_string(), "h".to_string(), "i".to_string()];
        assert_eq!(decode(&vocab, &[2, 9, 3, 1]), "hi");
    }
}
