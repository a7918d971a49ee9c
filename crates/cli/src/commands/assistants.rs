use anyhow::Result;

use super::{Context, Prompt, report};

const QUIT: [&str; 3] = ["sair", "exit", "quit"];

pub async fn repl(ctx: &Context) -> Result<()> {
    let processor = ctx.assistants_processor()?;
    let mut prompt = Prompt::new(ctx.shutdown.clone());

    if let Some(coordinator) = processor.coordinator() {
        let keys: Vec<&str> = coordinator.registry().keys().collect();
        println!("Especialistas disponíveis: {}", keys.join(", "));
    }
    println!("Digite sua pergunta ou 'sair' para encerrar.");

    while let Some(question) = prompt.question("\nPergunta: ").await? {
        if QUIT.iter().any(|q| question.eq_ignore_ascii_case(q)) {
            break;
        }

        match processor.process_assistants(&question).await {
            Ok((answer, _)) => println!("\nResposta:\n{answer}"),
            Err(err) => report(err)?,
        }
    }

    println!("Até logo!");
    Ok(())
}
