//! MedQA - 医学文档多轮问答
//!
//! 入口：初始化日志、加载配置与语料、创建编排器，并运行交互式问答循环。

use std::io::Write;

use anyhow::Context;
use medqa::core::create_orchestrator_builder;
use medqa::workflow::TurnEvent;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush().context("Failed to flush stdout")?;
    Ok(lines.next_line().await?.map(|l| l.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    medqa::observability::init();

    let builder = create_orchestrator_builder(None);
    let user_prompt = builder.config().app.user_prompt;
    println!("🩺 {}", builder.config().display_name());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TurnEvent>();
    let orchestrator = builder.build().await.with_events(event_tx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let session_id = if user_prompt {
        match prompt(&mut lines, "👤 Enter your user ID: ").await? {
            Some(id) if !id.is_empty() => id,
            Some(_) => "default".to_string(),
            None => return Ok(()),
        }
    } else {
        "default".to_string()
    };

    println!("💬 Ask a question about the case study (type 'exit' or 'quit' to stop).");

    loop {
        let Some(question) = prompt(&mut lines, "\n❓ Question: ").await? else {
            break;
        };
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let mut turn = orchestrator.begin_turn(&session_id).await;
        let result = {
            let run = turn.run(&question);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    biased;
                    Some(event) = event_rx.recv() => println!("{}", event),
                    res = &mut run => {
                        while let Ok(event) = event_rx.try_recv() {
                            println!("{}", event);
                        }
                        break res;
                    }
                }
            }
        };

        match result {
            Ok(outcome) => {
                println!("\n------ 🤖 Final Answer ------");
                println!("{}", outcome.answer);

                let Some(feedback) =
                    prompt(&mut lines, "\n🧠 [Feedback] Was this answer helpful? (Yes/No): ").await?
                else {
                    break;
                };
                if let Err(e) = turn.record_feedback(&feedback).await {
                    eprintln!("⚠️ Failed to record feedback: {}", e);
                }
            }
            Err(e) => eprintln!("❌ Error: {}", e),
        }
    }

    let (prompt_tokens, completion_tokens, total) = orchestrator.workflow().llm().token_usage();
    if total > 0 {
        println!(
            "📊 Token usage: prompt={} completion={} total={}",
            prompt_tokens, completion_tokens, total
        );
    }
    println!("👋 Bye");
    Ok(())
}
