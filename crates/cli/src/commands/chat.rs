//! Agent flow: one-shot questions and the conversation loop.

use anyhow::Result;
use scholar_coordinator::QuestionProcessor;
use scholar_memory::ConversationSummary;

use super::{Context, Prompt, report};

const QUIT: &str = "sair";
const NEW_CONVERSATION: &str = "nova";

pub async fn ask(ctx: &Context, question: &str) -> Result<()> {
    let processor = QuestionProcessor::new(ctx.config.api.clone())
        .with_agents(ctx.agent_router()?, ctx.config.agents.max_context_messages);

    let (answer, trace_id) = processor.process_agent(question).await?;
    println!("\nResposta:\n{answer}");
    if let Some(trace_id) = trace_id {
        println!("\nTrace ID: {trace_id}");
    }
    Ok(())
}

pub async fn chat(ctx: &Context) -> Result<()> {
    let processor = ctx.agent_processor().await?;
    let mut prompt = Prompt::new(ctx.shutdown.clone());

    let summaries = match processor.store() {
        Some(store) => store.summaries().await?,
        None => Vec::new(),
    };

    println!("Sistema Educacional de Perguntas e Respostas");
    if let Some(router) = processor.agent_router() {
        let names: Vec<&str> = router.specialists().iter().map(|p| p.name.as_str()).collect();
        println!("Especialistas disponíveis: {}", names.join(", "));
    }
    println!("Digite '{QUIT}' para encerrar ou '{NEW_CONVERSATION}' para iniciar outra conversa.");

    let Some(mut conversation) = pick_conversation(&mut prompt, &summaries).await? else {
        return Ok(());
    };

    loop {
        let Some(question) = prompt.question("\nSua pergunta: ").await? else {
            break;
        };

        if question.eq_ignore_ascii_case(QUIT) {
            break;
        }
        if question.eq_ignore_ascii_case(NEW_CONVERSATION) {
            conversation = None;
            println!("Nova conversa iniciada.");
            continue;
        }

        match processor
            .process_with_context(&question, conversation.as_deref())
            .await
        {
            Ok((answer, id)) => {
                println!("\nResposta:\n{answer}");
                conversation = Some(id);
            }
            Err(err) => report(err)?,
        }
    }

    if let Some(id) = conversation {
        println!("\nConversa salva com o ID: {id}");
    }
    println!("Até logo!");
    Ok(())
}

/// Offer stored conversations. The outer `None` means the user quit.
async fn pick_conversation(
    prompt: &mut Prompt,
    summaries: &[ConversationSummary],
) -> Result<Option<Option<String>>> {
    if summaries.is_empty() {
        return Ok(Some(None));
    }

    println!("\nConversas existentes:");
    for (i, summary) in summaries.iter().enumerate() {
        println!(
            "  {}. {} ({} mensagens, atualizada em {})",
            i + 1,
            display_name(summary),
            summary.message_count,
            summary.updated_at.format("%d/%m/%Y %H:%M")
        );
    }

    loop {
        let Some(choice) = prompt
            .line("\nNúmero da conversa para continuar (Enter para uma nova): ")
            .await?
        else {
            return Ok(None);
        };

        if choice.is_empty() || choice.eq_ignore_ascii_case(NEW_CONVERSATION) {
            return Ok(Some(None));
        }
        if choice.eq_ignore_ascii_case(QUIT) {
            return Ok(None);
        }

        match choice.parse::<usize>() {
            Ok(n) if (1..=summaries.len()).contains(&n) => {
                let summary = &summaries[n - 1];
                println!("Continuando a conversa '{}'.", display_name(summary));
                return Ok(Some(Some(summary.id.clone())));
            }
            _ => println!("Opção inválida. Escolha um número entre 1 e {}.", summaries.len()),
        }
    }
}

pub(crate) fn display_name(summary: &ConversationSummary) -> &str {
    if summary.name.is_empty() {
        &summary.id
    } else {
        &summary.name
    }
}
