// Demo Module - the filtering demo: a small fixed corpus run through the
// filter client one item at a time, with a best-effort fallback when the
// provider is unavailable.

use crate::llm::FilterClient;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UseCase {
    pub name: &'static str,
    pub items: &'static [&'static str],
    pub suggestions: &'static [&'static str],
}

pub const USE_CASES: &[UseCase] = &[
    UseCase {
        name: "youtube transcripts",
        items: &[
            "Hey everyone, welcome to my channel. Today I'm going to show you how to build a startup from scratch. The first thing you need to understand is product-market fit...",
            "In this video, I'll walk through the React useEffect hook and how to avoid infinite loops. Let's start with a basic example of fetching data...",
            "As a product manager, your main job is to bridge the gap between engineering and business. You need to understand both the technical constraints and the business goals...",
            "So I was debugging this memory leak in our Node.js application and found that we weren't properly cleaning up event listeners. Here's how I fixed it...",
            "Today we're going to talk about go-to-market strategy for B2B SaaS products. The key is to identify your ideal customer profile first...",
        ],
        suggestions: &["startup founders", "engineers", "product managers"],
    },
    UseCase {
        name: "email inbox",
        items: &[
            "Hi John, thanks for reaching out about the partnership opportunity. I'd love to schedule a call next week to discuss this further. Best regards, Sarah",
            "FLASH SALE! 50% off all premium courses this weekend only! Use code SAVE50 at checkout. Limited time offer!",
            "Your account has been compromised. Click here immediately to verify your identity and secure your account. Urgent action required!",
            "Meeting reminder: Weekly standup tomorrow at 10 AM PST. Please prepare your updates on the current sprint progress.",
            "Re: Budget approval for Q1 marketing campaign. I've reviewed the proposal and have a few questions about the attribution model...",
        ],
        suggestions: &["need a reply", "advertisement", "likely spam"],
    },
    UseCase {
        name: "recipe list",
        items: &[
            "Grilled Salmon with Quinoa - Fresh Atlantic salmon seasoned with herbs, served with fluffy quinoa and steamed vegetables",
            "Classic Margherita Pizza - Wood-fired pizza with fresh mozzarella, basil, and San Marzano tomatoes on house-made dough",
            "Kung Pao Tofu - Crispy tofu cubes tossed in a spicy Sichuan sauce with peanuts, vegetables, and dried chilies",
            "Mediterranean Chickpea Salad - Protein-rich chickpeas with cucumber, tomatoes, red onion, and tahini dressing",
            "Beef and Broccoli Stir-fry - Tender beef strips with fresh broccoli in a savory garlic-ginger sauce over jasmine rice",
        ],
        suggestions: &["vegan", "pescatarian", "Chinese food"],
    },
    UseCase {
        name: "customer feedback",
        items: &[
            "The mobile app keeps crashing when I try to upload photos. This has been happening for the past week and it's really frustrating.",
            "I love the new dashboard design! It would be awesome if you could add a dark mode option though. The bright white background strains my eyes during long work sessions.",
            "Your customer service team was incredibly helpful when I had billing questions. They resolved everything quickly and professionally.",
            "The search functionality is too slow. Sometimes it takes 10+ seconds to find what I'm looking for, which really hurts productivity.",
            "Could you please add keyboard shortcuts for common actions? As a power user, I'd love to navigate the app without always reaching for the mouse.",
        ],
        suggestions: &["feature request", "bug"],
    },
];

pub fn find_use_case(name: &str) -> Option<&'static UseCase> {
    USE_CASES.iter().find(|u| u.name == name)
}

/// Turn a suggestion chip into the filter question.
pub fn suggestion_prompt(suggestion: &str) -> String {
    format!("Is this {}?", suggestion)
}

/// A reply counts as a keep only when it leads with YES.
pub fn parse_verdict(reply: &str) -> bool {
    reply.trim().to_uppercase().starts_with("YES")
}

/// Run the filter over a use case, one item at a time with a fixed pause
/// between requests. Provider failures degrade to a uniformly-random
/// verdict for that item - the demo always produces a full result row and
/// never surfaces the error.
pub async fn run_filter<R: Rng>(
    client: &FilterClient,
    use_case: &UseCase,
    prompt: &str,
    item_delay: Duration,
    rng: &mut R,
) -> Vec<bool> {
    let mut results = Vec::with_capacity(use_case.items.len());
    for item in use_case.items {
        if !item_delay.is_zero() {
            tokio::time::sleep(item_delay).await;
        }
        let verdict = match client.classify(prompt, item).await {
            Ok(reply) => parse_verdict(&reply),
            Err(_) => rng.gen_bool(0.5),
        };
        results.push(verdict);
    }
    results
}
