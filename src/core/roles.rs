// src/core/roles.rs — Pipeline roles: system prompts, temperatures, prompt builders

use super::types::BusinessContext;

/// Bytes of strategy text passed to the visualizer.
pub const VISUALIZER_STRATEGY_LIMIT: usize = 2500;

/// One fixed (system prompt, temperature) configuration of the text generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Generator,
    Critic,
    Refiner,
    Visualizer,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::Generator,
        AgentRole::Critic,
        AgentRole::Refiner,
        AgentRole::Visualizer,
    ];

    pub fn temperature(&self) -> f32 {
        match self {
            AgentRole::Generator => 0.75,
            AgentRole::Critic => 0.55,
            AgentRole::Refiner => 0.65,
            AgentRole::Visualizer => 0.35,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Generator => "generator",
            AgentRole::Critic => "critic",
            AgentRole::Refiner => "refiner",
            AgentRole::Visualizer => "visualizer",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Generator => GENERATOR_PROMPT,
            AgentRole::Critic => CRITIC_PROMPT,
            AgentRole::Refiner => REFINER_PROMPT,
            AgentRole::Visualizer => VISUALIZER_PROMPT,
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

const GENERATOR_PROMPT: &str = "\
You are an expert business growth consultant with 15+ years of experience \
helping small and medium businesses, especially in emerging markets.

Given the business information and the main goal, produce a concise but \
powerful set of recommendations:

1. The 3-5 most important short-term actions (next 1-3 months)
2. 2-3 medium-term strategies (3-12 months)
3. Marketing channels and tactics suited to this business type, stage and location
4. Financial levers to improve profitability
5. Quick wins and early warning risks

Be realistic, specific and aware of the local business context. Use simple, \
actionable language with clear headings and bullet points.";

const CRITIC_PROMPT: &str = "\
You are a brutally honest senior business advisor. Critique the proposed \
strategy rigorously but constructively.

Check realism for the stage, location, team size and likely capital; local \
economic and logistical constraints; feasibility with limited resources; \
missing risks; optimistic assumptions; vague or generic advice; legal and \
regulatory issues; and prioritisation mistakes.

Structure your response:

1. Overall quality score (N/10)
2. Strong points
3. Major weaknesses and red flags
4. Missing elements and blind spots
5. Specific, concrete improvement suggestions

Be direct and professional. Never sugarcoat serious issues.";

const REFINER_PROMPT: &str = "\
You are an expert business strategy refiner. Take the original strategy and \
the critic's feedback and produce a clearly improved, more realistic version.

Rules:
- Address EVERY weakness and red flag in the critique
- Apply every concrete suggestion from the critic
- Keep and strengthen what the critic marked as strong
- Make the plan specific, measurable and realistic for the team size
- Adjust timelines, budgets and expectations to local realities
- Fix prioritisation and add missing practical detail (costs, owners, metrics)

Output format:
1. Improved short-term actions (1-3 months)
2. Improved medium-term strategies (3-12 months)
3. Key changes made and why
4. Remaining risks and mitigations
5. Success metrics and early indicators";

const VISUALIZER_PROMPT: &str = "\
You design clear business charts. Your ONLY output is a JSON chart \
specification, either one object or an array of at most two objects:

{\"kind\": \"line|bar|area|pie|waterfall|funnel\", \"title\": \"...\", \
\"labels\": [\"...\"], \"series\": [{\"name\": \"...\", \"values\": [0.0]}], \
\"x_label\": \"...\", \"y_label\": \"...\"}

Every series must have one value per label. Use realistic figures derived \
from the business context and strategy. Prefer revenue projections, cash \
flow, break-even timelines, scenario comparisons or expense breakdowns.

Output JSON only. No markdown, no code, no explanations.";

/// Generator input: context, main goal, other goals in caller order.
pub fn generator_prompt(business: &BusinessContext) -> String {
    format!(
        "Business information:\n{}\n\nMain goal: {}\nOther goals: {}\n\n\
         Generate comprehensive growth recommendations.",
        business.to_prompt_json(),
        business.main_goal,
        business.other_goals.join(", ")
    )
}

pub fn critic_prompt(business: &BusinessContext, strategy: &str) -> String {
    format!(
        "Business context:\n{}\n\nProposed strategy to critique:\n{}\n\n\
         Perform a rigorous, honest critique following the instructions above.",
        business.to_prompt_json(),
        strategy
    )
}

pub fn refiner_prompt(business: &BusinessContext, strategy: &str, critique: &str) -> String {
    format!(
        "Business context:\n{}\n\nOriginal strategy:\n{}\n\n\
         Critic's feedback (address ALL points):\n{}\n\n\
         Create a significantly improved version following the instructions above.",
        business.to_prompt_json(),
        strategy,
        critique
    )
}

pub fn visualizer_prompt(business: &BusinessContext, strategy: &str) -> String {
    format!(
        "Business context:\n{}\n\nCurrent best strategy:\n{}\n\n\
         Describe 1-2 of the most relevant charts. Focus on financial aspects \
         such as cash flow, break-even and revenue projection.\n\nOutput ONLY the JSON.",
        business.to_prompt_json(),
        truncate_on_char_boundary(strategy, VISUALIZER_STRATEGY_LIMIT)
    )
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a char.
pub fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
