use std::fmt;

use num_bigint::BigUint;

use super::{
    CodecError,
    parse_felt,
    parse_usize,
};

/// Number of bytes packed into one full word.
pub const WORD_BYTES: usize = 31;

/// Chunked felt representation of a byte string.
///
/// `full_words` hold exactly 31 bytes each, `pending_word` holds the
/// trailing `pending_len` (0..=30) bytes. Every word is the big-endian
/// integer value of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteArray {
    pub full_words: Vec<BigUint>,
    pub pending_word: BigUint,
    pub pending_len: usize,
}

impl ByteArray {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let chunks = bytes.chunks_exact(WORD_BYTES);
        let rest = chunks.remainder();
        let full_words = chunks.map(BigUint::from_bytes_be).collect();

        Self {
            full_words,
            pending_word: BigUint::from_bytes_be(rest),
            pending_len: rest.len(),
        }
    }

    /// Token count of the serialized form: count, words, pending word, pending length.
    pub fn token_len(&self) -> usize {
        self.full_words.len() + 3
    }

    /// Serialized tokens in wire order.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.token_len());
        tokens.push(self.full_words.len().to_string());
        tokens.extend(self.full_words.iter().map(|w| w.to_string()));
        tokens.push(self.pending_word.to_string());
        tokens.push(self.pending_len.to_string());
        tokens
    }

    /// Parse a ByteArray from the head of `tokens`, returning it with the
    /// number of tokens consumed.
    pub fn read(tokens: &[&str]) -> Result<(Self, usize), CodecError> {
        let count_token = tokens
            .first()
            .ok_or_else(|| CodecError::MalformedPayload("missing word count".into()))?;
        let count = parse_usize(count_token)?;
        let needed = count
            .checked_add(3)
            .ok_or_else(|| CodecError::MalformedPayload("word count overflow".into()))?;
        if tokens.len() < needed {
            return Err(CodecError::MalformedPayload(format!(
                "byte array declares {count} words but only {} tokens remain",
                tokens.len() - 1
            )));
        }

        let full_words = tokens[1..=count]
            .iter()
            .map(|t| parse_felt(t))
            .collect::<Result<Vec<_>, _>>()?;
        let pending_word = parse_felt(tokens[count + 1])?;
        let pending_len = parse_usize(tokens[count + 2])?;
        if pending_len >= WORD_BYTES {
            return Err(CodecError::MalformedPayload(format!(
                "pending word length {pending_len} exceeds {}",
                WORD_BYTES - 1
            )));
        }

        Ok((
            Self {
                full_words,
                pending_word,
                pending_len,
            },
            needed,
        ))
    }

    /// Recover the raw bytes. Words are left-padded back to their declared width.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let mut bytes = Vec::with_capacity(self.full_words.len() * WORD_BYTES + self.pending_len);
        for word in &self.full_words {
            bytes.extend(word_bytes(word, WORD_BYTES)?);
        }
        bytes.extend(word_bytes(&self.pending_word, self.pending_len)?);
        Ok(bytes)
    }
}

impl fmt::Display for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens().join(" "))
    }
}

/// Big-endian bytes of `word`, left-padded with zeros to exactly `width`.
fn word_bytes(word: &BigUint, width: usize) -> Result<Vec<u8>, CodecError> {
    let raw = if word.bits() == 0 {
        Vec::new()
    } else {
        word.to_bytes_be()
    };
    if raw.len() > width {
        return Err(CodecError::MalformedPayload(format!(
            "word {word} does not fit in {width} bytes"
        )));
    }
    let mut padded = vec![0u8; width - raw.len()];
    padded.extend(raw);
    Ok(padded)
}

/// Encode a string as `"<count> <word_1> ... <word_n> <pending_word> <pending_len>"`.
pub fn encode_byte_array(text: &str) -> String {
    ByteArray::from_bytes(text.as_bytes()).to_string()
}

/// Decode a string from exactly the tokens of one encoded ByteArray.
pub fn decode_byte_array(tokens: &[&str]) -> Result<String, CodecError> {
    let (array, consumed) = ByteArray::read(tokens)?;
    if consumed != tokens.len() {
        return Err(CodecError::MalformedPayload(format!(
            "{} trailing tokens after byte array",
            tokens.len() - consumed
        )));
    }
    bytes_to_string(array.to_bytes()?)
}

pub(crate) fn bytes_to_string(bytes: Vec<u8>) -> Result<String, CodecError> {
    String::from_utf8(bytes)
        .map_err(|e| CodecError::MalformedPayload(format!("byte array is not utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(text: &str) -> String {
        let encoded = encode_byte_array(text);
        let tokens: Vec<&str> = encoded.split(' ').collect();
        decode_byte_array(&tokens).unwrap()
    }

    #[test]
    fn test_encode_empty_string() {
        assert_eq!(encode_byte_array(""), "0 0 0");
    }

    #[test]
    fn test_encode_short_name() {
        // "faucet" = 0x666175636574
        assert_eq!(encode_byte_array("faucet"), "0 112568767309172 6");
    }

    #[test]
    fn test_encode_exact_word_has_empty_pending_word() {
        let text = "a".repeat(31);
        let array = ByteArray::from_bytes(text.as_bytes());
        assert_eq!(array.full_words.len(), 1);
        assert_eq!(array.pending_len, 0);
        assert_eq!(array.pending_word, BigUint::from(0u8));

        let encoded = encode_byte_array(&text);
        let tokens: Vec<&str> = encoded.split(' ').collect();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], "1");
        assert_eq!(tokens[2], "0");
        assert_eq!(tokens[3], "0");
    }

    #[test]
    fn test_roundtrip_printable_ascii() {
        for text in [
            "",
            "a",
            "faucet",
            "bryan.ecdsa_secp256r1",
            "c59b18d3bdaccb4d689048559a9bb6e8265293bf.ecdsa_secp256r1",
            &"x".repeat(62),
            &"y".repeat(63),
            " leading and trailing spaces ",
        ] {
            assert_eq!(roundtrip(text), text);
        }
    }

    #[test]
    fn test_roundtrip_keeps_leading_zero_bytes_of_full_words() {
        // A word whose first byte is NUL must still decode to 31 bytes.
        let mut text = String::from("\0");
        text.push_str(&"z".repeat(33));
        assert_eq!(roundtrip(&text), text);
    }

    #[test]
    fn test_roundtrip_multibyte_utf8_across_word_boundary() {
        let text = format!("{}é{}", "a".repeat(30), "b".repeat(5));
        assert_eq!(roundtrip(&text), text);
    }

    #[test]
    fn test_read_reports_consumed_tokens() {
        let tokens = ["0", "112568767309172", "6", "99"];
        let (array, consumed) = ByteArray::read(&tokens).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(array.to_bytes().unwrap(), b"faucet");
    }

    #[test]
    fn test_decode_rejects_short_token_list() {
        let err = decode_byte_array(&["2", "1", "2"]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn test_decode_rejects_oversized_pending_word() {
        // 0x0100 needs two bytes but the declared pending length is one.
        let err = decode_byte_array(&["0", "256", "1"]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }

    #[test]
    fn test_decode_rejects_trailing_tokens() {
        let err = decode_byte_array(&["0", "0", "0", "7"]).unwrap_err();
        assert!(matches!(err, CodecError::MalformedPayload(_)));
    }
}
