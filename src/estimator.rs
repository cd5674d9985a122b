// Estimator Module - worst-case cost arithmetic for a filtering pass
//
// max cost = (# items) x ((model input cost) x (prompt size + average
// tokens per item) + model output cost), with the output side fixed at the
// two tokens a YES/NO verdict costs.

use serde::Serialize;

/// Price card for one hosted model, dollars per million tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPricing {
    pub name: &'static str,
    pub input_cost: f64,
    pub output_cost: f64,
}

pub const MODELS: &[ModelPricing] = &[
    ModelPricing {
        name: "claude-sonnet-4",
        input_cost: 3.0,
        output_cost: 15.0,
    },
    ModelPricing {
        name: "gemini-2.5-flash-preview",
        input_cost: 0.15,
        output_cost: 0.60,
    },
    ModelPricing {
        name: "gpt-4.1",
        input_cost: 2.0,
        output_cost: 8.0,
    },
];

/// Token profile of one demo use case.
#[derive(Debug, Clone, Copy)]
pub struct UseCaseTokens {
    pub name: &'static str,
    pub item_count: u64,
    pub avg_tokens_per_item: u64,
    pub prompt_tokens: u64,
}

pub const USE_CASES: &[UseCaseTokens] = &[
    UseCaseTokens {
        name: "youtube transcripts",
        item_count: 5,
        avg_tokens_per_item: 150,
        prompt_tokens: 25,
    },
    UseCaseTokens {
        name: "email inbox",
        item_count: 5,
        avg_tokens_per_item: 80,
        prompt_tokens: 20,
    },
    UseCaseTokens {
        name: "recipe list",
        item_count: 5,
        avg_tokens_per_item: 60,
        prompt_tokens: 15,
    },
    UseCaseTokens {
        name: "customer feedback",
        item_count: 5,
        avg_tokens_per_item: 100,
        prompt_tokens: 20,
    },
];

/// A YES/NO verdict costs two output tokens.
const OUTPUT_TOKENS_PER_ITEM: u64 = 2;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CostBreakdown {
    pub prompt_tokens: u64,
    pub input_tokens_per_item: u64,
    pub output_tokens_per_item: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
    pub total: f64,
}

pub fn find_model(name: &str) -> Option<&'static ModelPricing> {
    MODELS.iter().find(|m| m.name == name)
}

pub fn find_use_case(name: &str) -> Option<&'static UseCaseTokens> {
    USE_CASES.iter().find(|u| u.name == name)
}

/// Rough tokenizer stand-in: four characters per token, rounded up.
pub fn approx_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Estimate the worst-case cost of filtering `use_case` with `model`. A
/// non-empty custom prompt replaces the use case's stock prompt size.
pub fn estimate(
    use_case: &UseCaseTokens,
    model: &ModelPricing,
    custom_prompt: Option<&str>,
) -> CostBreakdown {
    let prompt_tokens = match custom_prompt {
        Some(prompt) if !prompt.is_empty() => approx_tokens(prompt),
        _ => use_case.prompt_tokens,
    };

    let input_tokens_per_item = prompt_tokens + use_case.avg_tokens_per_item;
    let total_input_tokens = use_case.item_count * input_tokens_per_item;
    let total_output_tokens = use_case.item_count * OUTPUT_TOKENS_PER_ITEM;

    let input_cost = (total_input_tokens as f64 / 1_000_000.0) * model.input_cost;
    let output_cost = (total_output_tokens as f64 / 1_000_000.0) * model.output_cost;

    CostBreakdown {
        prompt_tokens,
        input_tokens_per_item,
        output_tokens_per_item: OUTPUT_TOKENS_PER_ITEM,
        total_input_tokens,
        total_output_tokens,
        input_cost,
        output_cost,
        total: input_cost + output_cost,
    }
}
