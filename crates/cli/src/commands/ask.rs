//! `sqlclaw ask`: Answer one question, or chat until `exit`.

use std::io::Write;

use sqlclaw_agent::{Agent, AgentEvent, RunOutcome};
use sqlclaw_config::AppConfig;
use sqlclaw_eval::AgentFactory;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use super::{AgentKit, preview};

/// Longest tool result echoed to the terminal.
const RESULT_PREVIEW_CHARS: usize = 400;

pub async fn run(config: AppConfig, question: Option<String>) -> anyhow::Result<()> {
    let kit = AgentKit::load(config).await?;
    let mut agent = kit.build();

    if let Some(question) = question {
        answer(&mut agent, &question).await;
        return Ok(());
    }

    println!();
    println!("  sqlclaw — interactive mode");
    println!("  Model: {}", kit.config().model);
    println!("  Commands: 'reset' clears the conversation, 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                agent.reset();
                println!("  Conversation reset.\n");
            }
            question => answer(&mut agent, question).await,
        }
    }
    println!();
    Ok(())
}

/// Run one question, printing events as they arrive.
async fn answer(agent: &mut Agent, question: &str) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (outcome, ()) = tokio::join!(agent.run(question, tx), print_events(rx));

    match &outcome {
        RunOutcome::Submitted { query, .. } => {
            println!("\nSubmitted SQL:\n{query}");
        }
        RunOutcome::Responded { .. } => println!(),
        RunOutcome::Exhausted { .. } | RunOutcome::Failed { .. } | RunOutcome::Cancelled => {}
    }
    let usage = outcome.usage();
    println!(
        "\n[tokens: {} prompt + {} completion = {}]\n",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<AgentEvent>) {
    while let Some(event) = rx.recv().await {
        print_event(&event);
        let _ = std::io::stdout().flush();
    }
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::ThinkingStart => eprint!("[thinking] "),
        AgentEvent::ThinkingChunk { chunk } => eprint!("{chunk}"),
        AgentEvent::ThinkingEnd => eprintln!(),
        AgentEvent::ResponseChunk { chunk } => print!("{chunk}"),
        AgentEvent::ToolCallParsed { name, arguments } => {
            println!("\n-> {name} {arguments}");
        }
        AgentEvent::ToolExecutionEnd { name, result } => {
            println!("<- {name}: {}", preview(result, RESULT_PREVIEW_CHARS));
        }
        AgentEvent::Error { error, .. } => eprintln!("\n[error] {error}"),
        _ => {}
    }
}
