//! Example: structured extraction with retries
//!
//! Extracts person information from free text. The model answers in a fenced
//! JSON block; malformed or non-conforming answers are retried with a hint.
//!
//! Configure the backend through `AGENTKIT_PROVIDER` / `AGENTKIT_MODEL` and the
//! provider's API key (a `.env` file works too).
//!
//! Run: `cargo run -p agentkit --example extraction`

use agentkit::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;

/// Person information to extract
#[derive(Debug, Deserialize, JsonSchema)]
struct PersonInfo {
    /// Full name of the person
    name: String,
    /// Age in years
    age: u32,
    /// Email address if mentioned
    email: Option<String>,
    /// List of skills or expertise
    skills: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv()?;
    let settings = ModelSettings::from_env()?;

    let agent = StructuredAgent::from_settings(&settings)?
        .system_prompt(
            "You are a data extraction agent. \
             Extract person information from the provided text. \
             Answer with a single ```json fenced block and nothing else.",
        )
        .schema_for::<PersonInfo>()
        .config(
            AgentConfig::new()
                .max_attempts(3)
                .feedback(FeedbackPolicy::AppendHint),
        )
        .build();

    let text = "Maria Garcia, 34, has spent a decade in data engineering. \
                She writes Rust and Python and runs Kubernetes clusters. \
                Reach her at maria.garcia@example.org.";

    match agent.respond(&[Message::user(text)]).await {
        Ok(response) => {
            let person: PersonInfo = serde_json::from_value(response.structured.unwrap_or_default())?;
            println!("{person:#?}");
            println!(
                "attempts: {}, ~{} input tokens",
                response.attempts, response.metrics.estimated_input_tokens
            );
        }
        Err(agentkit::Error::Run(failure)) => {
            eprintln!("extraction failed after {} attempts", failure.attempts());
            for record in failure.history() {
                eprintln!("  attempt {}: {}", record.attempt_number, record.failure);
            }
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
