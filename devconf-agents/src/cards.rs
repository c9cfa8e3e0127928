use devconf_a2a::{AgentCard, AgentSkill};
use devconf_core::agent_names;

fn invoke_url(public_url: &str) -> String {
    format!("{}/a2a", public_url.trim_end_matches('/'))
}

pub fn google_search_card(public_url: &str) -> AgentCard {
    AgentCard::builder()
        .name(agent_names::GOOGLE_SEARCH_AGENT)
        .description("Answers technical questions with up-to-date information from the web")
        .url(invoke_url(public_url))
        .version(env!("CARGO_PKG_VERSION"))
        .skills(vec![
            AgentSkill::new(
                "web_search",
                "Web search",
                "Searches the web and summarises the results with sources",
                &["search", "web", "news"],
            )
            .with_examples(&[
                "Search Google for the latest news on AI agents",
                "What changed in the latest Rust release?",
            ]),
        ])
        .build()
}

pub fn github_card(public_url: &str) -> AgentCard {
    AgentCard::builder()
        .name(agent_names::GITHUB_AGENT)
        .description("Analyses GitHub repositories: metadata, languages, contributors, issues, pull requests and releases")
        .url(invoke_url(public_url))
        .version(env!("CARGO_PKG_VERSION"))
        .skills(vec![
            AgentSkill::new(
                "repository_analysis",
                "Repository analysis",
                "Looks up repository statistics, activity and release history",
                &["github", "repository", "issues", "pull-requests"],
            )
            .with_examples(&["How many stars does tokio-rs/axum have?"]),
            AgentSkill::new(
                "repository_search",
                "Repository search",
                "Finds GitHub projects matching a topic or language",
                &["github", "search"],
            )
            .with_examples(&["Find popular Rust web frameworks on GitHub"]),
        ])
        .build()
}
