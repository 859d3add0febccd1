use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("entity pattern is valid")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>")
        .expect("script/style pattern is valid")
});

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"));

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:https?://|www\.)\S+").expect("url pattern is valid")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\s@]+@[^\s@]+\.[^\s@]+").expect("email pattern is valid")
});

pub const URL_TOKEN: &str = "[URL]";
pub const EMAIL_TOKEN: &str = "[EMAIL]";

/// Characters whose repetition at the end of a sentence is collapsed
const TERMINAL_PUNCTUATION: [char; 6] = ['.', '!', '?', '。', '！', '？'];

/// Cleans a piece of extracted text.
///
/// The pipeline decodes HTML entities, drops control characters and any
/// residual markup, masks URLs and email addresses, collapses repeated
/// terminal punctuation and normalizes whitespace. Every removal leaves a
/// space behind so no step can splice a new entity, tag or URL together,
/// which keeps `clean(clean(x)) == clean(x)`.
pub fn clean(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = replace_control_chars(text);
    let text = decode_entities(&text);
    let text = replace_control_chars(&text);
    let text = strip_markup(&text);
    let text = mask_contacts(&text);
    let text = collapse_terminal_punctuation(&text);

    normalize_whitespace(&text)
}

/// Replaces every control character (including tabs and newlines) with a space
pub fn replace_control_chars(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Decodes HTML entities until none are left.
///
/// Entities are decoded one at a time so that a single unknown entity does
/// not prevent the rest from being decoded. Unknown entities are kept.
pub fn decode_entities(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let decoded = ENTITY
            .replace_all(&current, |caps: &Captures| {
                let entity = &caps[0];
                htmlescape::decode_html(entity).unwrap_or_else(|_| entity.to_string())
            })
            .into_owned();

        if decoded == current {
            return decoded;
        }
        current = decoded;
    }
}

/// Removes script/style blocks and any remaining tags
pub fn strip_markup(text: &str) -> String {
    let without_blocks = SCRIPT_OR_STYLE.replace_all(text, " ");
    MARKUP.replace_all(&without_blocks, " ").into_owned()
}

/// Masks URLs with `[URL]` and email-like strings with `[EMAIL]`.
///
/// Chained addresses (`a@b.c@d.e`) leave a token that is itself the local
/// part of a new address, so emails are masked until nothing matches.
pub fn mask_contacts(text: &str) -> String {
    let mut current = URL.replace_all(text, URL_TOKEN).into_owned();
    loop {
        let masked = EMAIL.replace_all(&current, EMAIL_TOKEN).into_owned();
        if masked == current {
            return masked;
        }
        current = masked;
    }
}

/// Collapses runs of the same terminal punctuation mark ("!!!" -> "!")
pub fn collapse_terminal_punctuation(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous: Option<char> = None;

    for c in text.chars() {
        if TERMINAL_PUNCTUATION.contains(&c) && previous == Some(c) {
            continue;
        }
        result.push(c);
        previous = Some(c);
    }

    result
}

/// Collapses whitespace runs into single spaces and trims the result
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
