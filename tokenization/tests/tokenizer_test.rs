//! Integration tests for tokenization
//!
//! These tests create a minimal tokenizer for testing purposes
//! without requiring external model downloads.

use taskpipe_tokenization::{Tokenizer, TokenizationError};
use std::path::PathBuf;
use tempfile::TempDir;
use std::fs;

/// Create a minimal test tokenizer.json for basic testing
fn create_test_tokenizer() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let tokenizer_path = temp_dir.path().join("tokenizer.json");
    
    // Minimal BPE tokenizer with basic vocabulary
    let tokenizer_json = r###"{
  "version": "1.0",
  "truncation": null,
  "padding": null,
  "added_tokens": [
    {
      "id": 0,
      "content": "[PAD]",
      "single_word": false,
      "lstrip": false,
      "rstrip": false,
      "normalized": false,
      "special": true
    },
    {
      "id": 1,
      "content": "[UNK]",
      "single_word": false,
      "lstrip": false,
      "rstrip": false,
      "normalized": false,
      "special": true
    },
    {
      "id": 2,
      "content": "[CLS]",
      "single_word": false,
      "lstrip": false,
      "rstrip": false,
      "normalized": false,
      "special": true
    },
    {
      "id": 3,
      "content": "[SEP]",
      "single_word": false,
      "lstrip": false,
      "rstrip": false,
      "normalized": false,
      "special": true
    },
    {
      "id": 4,
      "content": "[MASK]",
      "single_word": false,
      "lstrip": false,
      "rstrip": false,
      "normalized": false,
      "special": true
    }
  ],
  "normalizer": {
    "type": "Sequence",
    "normalizers": [
      {
        "type": "NFD"
      },
      {
        "type": "Lowercase"
      },
      {
        "type": "StripAccents"
      }
    ]
  },
  "pre_tokenizer": {
    "type": "Whitespace"
  },
  "post_processor": {
    "type": "TemplateProcessing",
    "single": [
      {
        "SpecialToken": {
          "id": "[CLS]",
          "type_id": 0
        }
      },
      {
        "Sequence": {
          "id": "A",
          "type_id": 0
        }
      },
      {
        "SpecialToken": {
          "id": "[SEP]",
          "type_id": 0
        }
      }
    ],
    "pair": [
      {
        "SpecialToken": {
          "id": "[CLS]",
          "type_id": 0
        }
      },
      {
        "Sequence": {
          "id": "A",
          "type_id": 0
        }
      },
      {
        "SpecialToken": {
          "id": "[SEP]",
          "type_id": 0
        }
      },
      {
        "Sequence": {
          "id": "B",
          "type_id": 1
        }
      },
      {
        "SpecialToken": {
          "id": "[SEP]",
          "type_id": 1
        }
      }
    ],
    "special_tokens": {
      "[CLS]": {
        "id": "[CLS]",
        "ids": [2],
        "tokens": ["[CLS]"]
      },
      "[SEP]": {
        "id": "[SEP]",
        "ids": [3],
        "tokens": ["[SEP]"]
      }
    }
  },
  "decoder": {
    "type": "WordPiece",
    "prefix": "##",
    "cleanup": true
  },
  "model": {
    "type": "WordPiece",
    "unk_token": "[UNK]",
    "continuing_subword_prefix": "##",
    "max_input_chars_per_word": 100,
    "vocab": {
      "[PAD]": 0,
      "[UNK]": 1,
      "[CLS]": 2,
      "[SEP]": 3,
      "[MASK]": 4,
      "hello": 5,
      "world": 6,
      "paris": 7,
      "is": 8,
      "the": 9,
      "capital": 10,
      "of": 11,
      "france": 12,
      ".": 13,
      "mat": 14,
      "##z": 15
    }
  }
}"###;
    
    fs::write(&tokenizer_path, tokenizer_json)
        .expect("Failed to write tokenizer.json");
    
    (temp_dir, tokenizer_path)
}


fn load_test_tokenizer() -> (TempDir, Tokenizer) {
    let (temp_dir, tokenizer_path) = create_test_tokenizer();
    let tokenizer = Tokenizer::from_file(&tokenizer_path)
        .expect("Failed to load tokenizer");
    (temp_dir, tokenizer)
}

#[test]
fn test_tokenizer_from_file() {
    let (_temp_dir, tokenizer_path) = create_test_tokenizer();
    
    let tokenizer = Tokenizer::from_file(&tokenizer_path);
    assert!(tokenizer.is_ok(), "Should load tokenizer from file");
}

#[test]
fn test_tokenizer_from_nonexistent_file() {
    let result = Tokenizer::from_file("nonexistent_tokenizer.json");
    match result {
        Err(TokenizationError::Load { path, .. }) => {
            assert_eq!(path, PathBuf::from("nonexistent_tokenizer.json"));
        }
        other => panic!("expected a load error, got {:?}", other.err()),
    }
}

#[test]
fn test_encode_adds_special_tokens() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let encoding = tokenizer.encode("hello world", true)
        .expect("Failed to encode text");
    
    assert_eq!(encoding.get_ids(), &[2, 5, 6, 3]);
    assert_eq!(encoding.get_special_tokens_mask(), &[1, 0, 0, 1]);
}

#[test]
fn test_offsets_point_into_original_text() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    let text = "Hello Matz";
    
    let encoding = tokenizer.encode(text, true)
        .expect("Failed to encode text");
    
    assert_eq!(encoding.get_tokens(), &["[CLS]", "hello", "mat", "##z", "[SEP]"]);
    let offsets = encoding.get_offsets();
    assert_eq!(&text[offsets[1].0..offsets[1].1], "Hello");
    assert_eq!(&text[offsets[2].0..offsets[2].1], "Mat");
    assert_eq!(&text[offsets[3].0..offsets[3].1], "z");
    // Sub-word pieces share the word id of their word
    let word_ids = encoding.get_word_ids();
    assert_eq!(word_ids[2], word_ids[3]);
    assert_ne!(word_ids[1], word_ids[2]);
}

#[test]
fn test_encode_pair_marks_sequences() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let encoding = tokenizer.encode_pair("hello", "paris is the capital", true)
        .expect("Failed to encode pair");
    
    let sequence_ids = encoding.get_sequence_ids();
    assert_eq!(sequence_ids.first(), Some(&None));
    assert_eq!(sequence_ids[1], Some(0));
    assert_eq!(sequence_ids[3], Some(1));
    assert_eq!(encoding.get_type_ids()[3], 1);
    
    // Offsets of the second segment are relative to the second text
    let offsets = encoding.get_offsets();
    assert_eq!(offsets[3], (0, 5));
}

#[test]
fn test_decode_merges_subwords() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let decoded = tokenizer.decode(&[14, 15], true)
        .expect("Failed to decode");
    
    assert_eq!(decoded, "matz");
}

#[test]
fn test_decode_skips_special_tokens() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let ids = vec![2, 5, 6, 3]; // [CLS], hello, world, [SEP]
    
    let decoded_with_special = tokenizer.decode(&ids, false)
        .expect("Failed to decode with special tokens");
    let decoded_without_special = tokenizer.decode(&ids, true)
        .expect("Failed to decode without special tokens");
    
    assert!(decoded_with_special.contains("[CLS]"));
    assert_eq!(decoded_without_special, "hello world");
}

#[test]
fn test_special_token_ids() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    assert_eq!(tokenizer.eos_token_id(), Some(3), "EOS should be [SEP] with ID 3");
    assert_eq!(tokenizer.pad_token_id(), Some(0), "PAD should have ID 0");
}

#[test]
fn test_mask_token_lookup() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    assert_eq!(tokenizer.mask_token(), Some("[MASK]"));
    assert_eq!(tokenizer.token_to_id("[MASK]"), Some(4));
    assert_eq!(tokenizer.id_to_token(10).as_deref(), Some("capital"));
}

#[test]
fn test_mask_token_falls_back_to_roberta_style() {
    let (_temp_dir, tokenizer_path) = create_test_tokenizer();
    let json = fs::read_to_string(&tokenizer_path).expect("Failed to read tokenizer.json");
    fs::write(&tokenizer_path, json.replace("[MASK]", "<mask>")).expect("Failed to rewrite tokenizer.json");
    
    let tokenizer = Tokenizer::from_file(&tokenizer_path).expect("Failed to load tokenizer");
    
    assert_eq!(tokenizer.mask_token(), Some("<mask>"));
    assert_eq!(tokenizer.token_to_id("<mask>"), Some(4));
}

#[test]
fn test_mask_token_is_kept_whole() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let encoding = tokenizer.encode("Paris is the [MASK] of France.", true)
        .expect("Failed to encode");
    
    assert_eq!(encoding.get_ids(), &[2, 7, 8, 9, 4, 11, 12, 13, 3]);
}

#[test]
fn test_truncation() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    let tokenizer = tokenizer.with_max_length(4).expect("Failed to set truncation");
    
    let encoding = tokenizer.encode("paris is the capital of france", true)
        .expect("Failed to encode");
    
    assert_eq!(encoding.get_ids().len(), 4);
    assert_eq!(encoding.get_ids().last(), Some(&3));
}

#[test]
fn test_zero_max_length_rejected() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let result = tokenizer.with_max_length(0);
    assert!(matches!(result, Err(TokenizationError::ZeroMaxLength)));
}

#[test]
fn test_unknown_tokens() {
    let (_temp_dir, tokenizer) = load_test_tokenizer();
    
    let encoding = tokenizer.encode("unknown words", true)
        .expect("Should handle unknown tokens");
    
    assert!(encoding.get_ids().contains(&1), "Unknown words map to [UNK]");
}
