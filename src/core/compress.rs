//! Dictionary compression of batch payloads into a transport-safe alphabet.
//!
//! The primary form is LZW over the UTF-8 bytes of the input. Each output
//! code is written as one Unicode scalar (UTF-8 encoded), the byte stream is
//! prefixed with `0xFF` and the whole thing is base64 encoded. `0xFF` never
//! starts valid UTF-8, so the fallback form (plain base64 of the input's
//! UTF-8 bytes) is always distinguishable.

use crate::error::CodecError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;

/// Leading byte of the LZW form.
const LZW_MARKER: u8 = 0xFF;

/// First code past the single-byte alphabet.
const FIRST_CODE: u32 = 256;

/// Width of the UTF-16 surrogate block, which cannot hold a `char`.
const SURROGATE_SPAN: u32 = 0x800;

/// Largest code representable as a scalar value once surrogates are skipped.
pub const MAX_CODE: u32 = char::MAX as u32 - SURROGATE_SPAN;

/// Stateless text codec.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    max_code: u32,
}

impl Default for Compressor {
    fn default() -> Self {
        Self { max_code: MAX_CODE }
    }
}

impl Compressor {
    /// Codec whose dictionary may not grow past `max_code`; inputs that need
    /// more codes take the fallback path.
    pub fn with_code_limit(max_code: u32) -> Self {
        Self {
            max_code: max_code.clamp(FIRST_CODE, MAX_CODE),
        }
    }

    /// Compress `text`. Never fails.
    pub fn compress(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        match self.encode_lzw(text.as_bytes()) {
            Some(codes) => {
                let mut bytes = Vec::with_capacity(codes.len() + 1);
                bytes.push(LZW_MARKER);
                let mut buf = [0u8; 4];
                for code in codes {
                    // encode_lzw never hands out codes above MAX_CODE
                    match code_to_char(code) {
                        Some(ch) => bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes()),
                        None => return STANDARD.encode(text.as_bytes()),
                    }
                }
                STANDARD.encode(bytes)
            }
            None => {
                tracing::debug!(len = text.len(), "Dictionary exhausted, using plain base64");
                STANDARD.encode(text.as_bytes())
            }
        }
    }

    /// Inverse of [`compress`](Self::compress) for either form.
    pub fn decompress(&self, encoded: &str) -> Result<String, CodecError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        match bytes.split_first() {
            None => Ok(String::new()),
            Some((&LZW_MARKER, body)) => {
                let body = String::from_utf8(body.to_vec())?;
                let codes: Vec<u32> = body.chars().map(char_to_code).collect();
                decode_lzw(&codes)
            }
            Some(_) => Ok(String::from_utf8(bytes)?),
        }
    }

    fn encode_lzw(&self, input: &[u8]) -> Option<Vec<u32>> {
        let (&first, rest) = input.split_first()?;
        let mut dict: HashMap<(u32, u8), u32> = HashMap::new();
        let mut next = FIRST_CODE;
        let mut codes = Vec::new();
        let mut phrase = u32::from(first);

        for &byte in rest {
            if let Some(&code) = dict.get(&(phrase, byte)) {
                phrase = code;
                continue;
            }
            codes.push(phrase);
            if next > self.max_code {
                return None;
            }
            dict.insert((phrase, byte), next);
            next += 1;
            phrase = u32::from(byte);
        }
        codes.push(phrase);
        Some(codes)
    }
}

/// Compress with the default codec.
pub fn compress(text: &str) -> String {
    Compressor::default().compress(text)
}

/// Decompress with the default codec.
pub fn decompress(encoded: &str) -> Result<String, CodecError> {
    Compressor::default().decompress(encoded)
}

fn code_to_char(code: u32) -> Option<char> {
    if code < 0xD800 {
        char::from_u32(code)
    } else {
        char::from_u32(code.checked_add(SURROGATE_SPAN)?)
    }
}

fn char_to_code(ch: char) -> u32 {
    let c = ch as u32;
    if c < 0xD800 {
        c
    } else {
        c - SURROGATE_SPAN
    }
}

fn decode_lzw(codes: &[u32]) -> Result<String, CodecError> {
    let Some((&first, rest)) = codes.split_first() else {
        return Ok(String::new());
    };

    let mut dict: Vec<Vec<u8>> = (0..=255u8).map(|b| vec![b]).collect();
    let mut prev = dict
        .get(first as usize)
        .cloned()
        .ok_or(CodecError::InvalidCode(first))?;
    let mut out = prev.clone();

    for &code in rest {
        let entry = match dict.get(code as usize) {
            Some(entry) => entry.clone(),
            // code being defined by this very step (the cScSc case)
            None if code as usize == dict.len() => {
                let mut entry = prev.clone();
                entry.push(prev[0]);
                entry
            }
            None => return Err(CodecError::InvalidCode(code)),
        };
        out.extend_from_slice(&entry);

        let mut added = prev;
        added.push(entry[0]);
        dict.push(added);
        prev = entry;
    }

    Ok(String::from_utf8(out)?)
}
