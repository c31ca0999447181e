//! Approximate token counting across vendors

use std::sync::LazyLock;

use tiktoken_rs::CoreBPE;

/// Correction applied to reference counts for Claude models
const CLAUDE_MULTIPLIER: f64 = 1.15;

/// Shared reference encoding, loaded on first use
static ENCODING: LazyLock<Option<CoreBPE>> = LazyLock::new(|| match tiktoken_rs::o200k_base() {
    Ok(bpe) => Some(bpe),
    Err(e) => {
        tracing::warn!(error = %e, "o200k_base encoding unavailable, falling back to character estimate");
        None
    }
});

/// Count tokens with the reference encoding
///
/// Falls back to `ceil(chars / 4)` when the encoding cannot be loaded.
pub fn count_tokens(text: &str) -> usize {
    ENCODING.as_ref().map_or_else(
        || estimate_from_chars(text),
        |bpe| bpe.encode_with_special_tokens(text).len(),
    )
}

/// Character-based estimate used when no encoding is available
pub fn estimate_from_chars(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Scaling factor approximating a vendor's own tokenizer
pub fn multiplier(model: &str) -> f64 {
    if crate::capabilities::normalize(model).starts_with("claude") {
        CLAUDE_MULTIPLIER
    } else {
        1.0
    }
}

/// Estimate the tokens a model would count for the given texts
pub fn count_tokens_for_model<'a>(model: &str, texts: impl IntoIterator<Item = &'a str>) -> usize {
    let total: usize = texts.into_iter().map(count_tokens).sum();
    scale(total, multiplier(model))
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scale(tokens: usize, multiplier: f64) -> usize {
    (tokens as f64 * multiplier).ceil() as usize
}
