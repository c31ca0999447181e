//! Static per-family model limits

/// Output tokens held back from the context window for every known family
const RESERVED_OUTPUT: u32 = 5_000;

/// Token limits for a model family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelLimits {
    /// Total context window
    pub context: u32,
    /// Tokens reserved for the model's output
    pub reserved_output: u32,
    /// Explicit cap on input tokens, when tighter than the window allows
    pub input: Option<u32>,
}

impl ModelLimits {
    /// Tokens available for input
    pub fn input_cap(&self) -> u32 {
        let cap = self.context.saturating_sub(self.reserved_output);
        self.input.map_or(cap, |input| cap.min(input))
    }
}

/// Normalize a model id: lowercase, drop vendor prefix and tag suffix
///
/// `anthropic/claude-opus-4-6`, `anthropic:claude-opus-4-6` and
/// `Claude-Opus-4-6` all normalize to `claude-opus-4-6`.
pub fn normalize(model: &str) -> String {
    let model = model.trim().to_lowercase();
    let model = model.rsplit_once('/').map_or(model.as_str(), |(_, rest)| rest);
    let model = model.rsplit_once(':').map_or(model, |(_, rest)| rest);
    model.to_owned()
}

/// Look up the limits for a model, zero for unknown families
pub fn limits(model: &str) -> ModelLimits {
    let model = normalize(model);

    if model.starts_with("claude") {
        return ModelLimits {
            context: 200_000,
            reserved_output: RESERVED_OUTPUT,
            input: None,
        };
    }

    if model.starts_with("gpt-5") {
        return if model.contains("pro") {
            ModelLimits {
                context: 400_000,
                reserved_output: RESERVED_OUTPUT,
                input: Some(272_000),
            }
        } else if model.contains("chat") {
            ModelLimits {
                context: 128_000,
                reserved_output: RESERVED_OUTPUT,
                input: None,
            }
        } else {
            ModelLimits {
                context: 272_000,
                reserved_output: RESERVED_OUTPUT,
                input: None,
            }
        };
    }

    ModelLimits::default()
}

/// Total context window for a model
pub fn context_window(model: &str) -> u32 {
    limits(model).context
}

/// Tokens reserved for output
pub fn reserved_output(model: &str) -> u32 {
    limits(model).reserved_output
}

/// Tokens available for input
pub fn input_cap(model: &str) -> u32 {
    limits(model).input_cap()
}
