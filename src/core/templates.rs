//! Built-in task templates offered by the gallery.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: &'static str,
    pub prompt: &'static str,
    pub default_schedule: &'static str,
}

// --- News & research ---

const TECH_NEWS_DIGEST: Template = Template {
    id: "tech-news-digest",
    name: "Tech news digest",
    description: "Summarise the most important technology stories of the day.",
    category: "News & Research",
    prompt: "List the five most important technology news stories from the last 24 hours. \
             For each one give a one-line headline, a two-sentence summary and why it matters.",
    default_schedule: "Every day at 08:00",
};

const AI_PAPER_WATCH: Template = Template {
    id: "ai-paper-watch",
    name: "AI research watch",
    description: "Track notable new AI papers and explain them in plain language.",
    category: "News & Research",
    prompt: "Pick three notable AI research papers published this week. \
             Explain each one in plain language: the problem, the idea, and the result.",
    default_schedule: "Every Monday at 09:00",
};

// --- Markets ---

const MARKET_BRIEF: Template = Template {
    id: "market-brief",
    name: "Market brief",
    description: "A short pre-market overview of indices, movers and upcoming events.",
    category: "Markets",
    prompt: "Write a short pre-market brief: major index moves overnight, notable movers, \
             and economic events scheduled for today. Keep it under 200 words.",
    default_schedule: "Weekdays at 07:30",
};

const CRYPTO_PULSE: Template = Template {
    id: "crypto-pulse",
    name: "Crypto pulse",
    description: "Daily sentiment and price summary for the largest cryptocurrencies.",
    category: "Markets",
    prompt: "Summarise today's sentiment and price action for BTC, ETH and SOL. \
             Mention any major news driving the moves.",
    default_schedule: "Every day at 20:00",
};

// --- Productivity ---

const WEEKLY_PLAN: Template = Template {
    id: "weekly-plan",
    name: "Weekly planner",
    description: "Draft a focused plan for the coming week.",
    category: "Productivity",
    prompt: "Help me plan the coming week. Suggest three priorities, a daily focus block \
             schedule, and one habit to build. Format the answer as a checklist.",
    default_schedule: "Every Sunday at 18:00",
};

const WRITING_PROMPT: Template = Template {
    id: "writing-prompt",
    name: "Daily writing prompt",
    description: "One creative writing prompt to start the day.",
    category: "Productivity",
    prompt: "Give me one original creative writing prompt with a short opening sentence \
             to get me started.",
    default_schedule: "Every day at 06:30",
};

const BUILTIN_TEMPLATES: &[Template] = &[
    TECH_NEWS_DIGEST,
    AI_PAPER_WATCH,
    MARKET_BRIEF,
    CRYPTO_PULSE,
    WEEKLY_PLAN,
    WRITING_PROMPT,
];

pub fn builtin_templates() -> &'static [Template] {
    BUILTIN_TEMPLATES
}

pub fn find_template(id: &str) -> Option<&'static Template> {
    builtin_templates().iter().find(|t| t.id == id)
}

/// Templates grouped by category, in order of each category's first appearance.
pub fn grouped_templates() -> Vec<(&'static str, Vec<&'static Template>)> {
    let mut groups: Vec<(&'static str, Vec<&'static Template>)> = Vec::new();
    for template in builtin_templates() {
        match groups.iter_mut().find(|(cat, _)| *cat == template.category) {
            Some((_, members)) => members.push(template),
            None => groups.push((template.category, vec![template])),
        }
    }
    groups
}
