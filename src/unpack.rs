//! P.A.C.K.E.R. unpacker.
//!
//! Embed hosts ship their player setup as
//! `eval(function(p,a,c,k,e,d){...}('payload',radix,count,'w0|w1|...'.split('|'),0,{}))`.
//! Every word in the payload is an index into the dictionary written in
//! the packer's own base (`0-9a-zA-Z`, radix up to 62). Undoing that
//! substitution gives back the player script.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{ExtractError, Result};

/// Packed scripts may wrap packed scripts; stop after this many layers.
const MAX_LAYERS: usize = 8;

const DIGITS: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

static SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"eval\s*\(\s*function\s*\(\s*p\s*,\s*a\s*,\s*c\s*,\s*k\s*,\s*e\s*,")
        .expect("static regex")
});

// }('payload', radix|[], count, 'dictionary'.split('|')
static ARGUMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)\}\s*\(\s*'((?:[^'\\]|\\.)*)'\s*,\s*(\d+|\[\])\s*,\s*(\d+)\s*,\s*'((?:[^'\\]|\\.)*)'\s*\.split\(\s*'\|'\s*\)",
    )
    .expect("static regex")
});

// `,0,{}))` closing the eval call
static CALL_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:,[^()]*)?\)\s*\)").expect("static regex"));

// The packer's JS side uses an ASCII `\b\w+\b`
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u:\b\w+\b)").expect("static regex"));

/// True if `source` contains a packed script.
#[must_use]
pub fn detect(source: &str) -> bool {
    SIGNATURE.is_match(source)
}

/// Every packed script in a page, each slice running up to the next one.
pub fn find_packed(source: &str) -> Vec<&str> {
    let starts: Vec<usize> = SIGNATURE.find_iter(source).map(|m| m.start()).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(source.len());
            &source[start..end]
        })
        .collect()
}

/// Unpack the first packed script in `source`.
///
/// Nested packing is unwound up to [`MAX_LAYERS`]. Any malformed layer
/// fails the whole call; no partially substituted text is returned.
pub fn unpack(source: &str) -> Result<String> {
    let start = SIGNATURE
        .find(source)
        .ok_or_else(|| ExtractError::NotFound("packed script signature".into()))?;

    let (mut script, _) = unpack_layer(&source[start.start()..])?;
    for _ in 1..MAX_LAYERS {
        match SIGNATURE.find(&script) {
            Some(inner) => {
                let (unpacked, len) = unpack_layer(&script[inner.start()..])?;
                let end = inner.start() + len;
                script = format!("{}{unpacked}{}", &script[..inner.start()], &script[end..]);
            }
            None => return Ok(script),
        }
    }

    if detect(&script) {
        return Err(ExtractError::Malformed(format!(
            "packed script nested deeper than {MAX_LAYERS} layers"
        )));
    }
    Ok(script)
}

/// Unpack the call at the start of `packed`. Also returns how many bytes
/// of `packed` the call spans.
fn unpack_layer(packed: &str) -> Result<(String, usize)> {
    let caps = ARGUMENTS
        .captures(packed)
        .ok_or_else(|| ExtractError::Malformed("packer arguments not found".into()))?;

    let payload = unescape_js(&caps[1]);
    let radix = match &caps[2] {
        "[]" => 62,
        digits => digits
            .parse::<usize>()
            .map_err(|_| ExtractError::Malformed(format!("bad radix {digits}")))?,
    };
    if !(2..=62).contains(&radix) {
        return Err(ExtractError::Malformed(format!("unsupported radix {radix}")));
    }
    let count = caps[3]
        .parse::<usize>()
        .map_err(|_| ExtractError::Malformed(format!("bad word count {}", &caps[3])))?;

    let dictionary_raw = unescape_js(&caps[4]);
    let dictionary: Vec<&str> = dictionary_raw.split('|').collect();
    if dictionary.len() != count {
        return Err(ExtractError::Malformed(format!(
            "dictionary has {} words, header says {count}",
            dictionary.len()
        )));
    }

    let mut out_of_range = None;
    let script = WORD.replace_all(&payload, |caps: &Captures| {
        let word = &caps[0];
        match decode_index(word, radix) {
            Some(index) if index < count => match dictionary[index] {
                "" => word.to_string(),
                entry => entry.to_string(),
            },
            Some(index) => {
                out_of_range.get_or_insert(index);
                word.to_string()
            }
            None => word.to_string(),
        }
    });

    if let Some(index) = out_of_range {
        return Err(ExtractError::Malformed(format!(
            "word index {index} beyond dictionary of {count}"
        )));
    }
    let args_end = caps.get(0).map_or(packed.len(), |m| m.end());
    let call_end = CALL_END
        .find(&packed[args_end..])
        .map_or(args_end, |m| args_end + m.end());
    Ok((script.into_owned(), call_end))
}

fn digit_value(ch: char) -> Option<usize> {
    match ch {
        '0'..='9' => Some(ch as usize - '0' as usize),
        'a'..='z' => Some(ch as usize - 'a' as usize + 10),
        'A'..='Z' => Some(ch as usize - 'A' as usize + 36),
        _ => None,
    }
}

/// Index encoded by `word`, if `word` is exactly how the packer writes it.
///
/// Non-canonical spellings (`01`, uppercase digits under radix 36) are
/// plain words the packer never produced, so they stay as they are.
fn decode_index(word: &str, radix: usize) -> Option<usize> {
    let mut value: usize = 0;
    for ch in word.chars() {
        let digit = digit_value(ch).filter(|&d| d < radix)?;
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    (encode_index(value, radix) == word).then_some(value)
}

fn encode_index(mut index: usize, radix: usize) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(DIGITS[index % radix]);
        index /= radix;
        if index == 0 {
            break;
        }
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

/// Value of a single-quoted JS string literal body.
fn unescape_js(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('x') => push_hex_escape(&mut out, &mut chars, 2, 'x'),
            Some('u') => push_hex_escape(&mut out, &mut chars, 4, 'u'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_hex_escape(out: &mut String, chars: &mut std::str::Chars<'_>, len: usize, marker: char) {
    let hex: String = chars.clone().take(len).collect();
    let decoded = (hex.len() == len)
        .then(|| u32::from_str_radix(&hex, 16).ok())
        .flatten()
        .and_then(char::from_u32);
    match decoded {
        Some(ch) => {
            out.push(ch);
            for _ in 0..len {
                chars.next();
            }
        }
        None => out.push(marker),
    }
}

fn escape_js(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reference compactor for the same scheme, used to build fixtures.
///
/// Words are numbered in first-seen order; a word that already equals its
/// own encoding gets an empty dictionary slot, as the original packer does.
#[must_use]
pub fn pack(script: &str, radix: usize) -> String {
    let radix = radix.clamp(2, 62);

    let mut words: Vec<&str> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for word in WORD.find_iter(script).map(|m| m.as_str()) {
        index.entry(word).or_insert_with(|| {
            words.push(word);
            words.len() - 1
        });
    }

    let payload = WORD.replace_all(script, |caps: &Captures| {
        encode_index(index[&caps[0]], radix)
    });
    let dictionary = words
        .iter()
        .enumerate()
        .map(|(i, word)| if encode_index(i, radix) == *word { "" } else { *word })
        .collect::<Vec<_>>()
        .join("|");

    format!(
        "eval(function(p,a,c,k,e,d){{e=function(c){{return(c<a?'':e(parseInt(c/a)))+((c=c%a)>35?String.fromCharCode(c+29):c.toString(36))}};while(c--){{if(k[c]){{p=p.replace(new RegExp('\\\\b'+e(c)+'\\\\b','g'),k[c])}}}}return p}}('{}',{radix},{},'{dictionary}'.split('|'),0,{{}}))",
        escape_js(&payload),
        words.len(),
    )
}
