//! Thread maintenance for the assistants flow.

use anyhow::Result;
use scholar_llm::Run;

use super::Context;

fn describe(run: &Run) -> String {
    format!(
        "{}  {:<16} {}",
        run.id,
        run.status,
        run.assistant_id.as_deref().unwrap_or("-")
    )
}

pub async fn list(ctx: &Context) -> Result<()> {
    let coordinator = ctx.run_coordinator()?;
    let active = coordinator.list_active_runs().await?;

    if active.is_empty() {
        println!("Nenhum run ativo na thread {}.", coordinator.thread_id());
        return Ok(());
    }

    println!("Runs ativos na thread {}:", coordinator.thread_id());
    for run in &active {
        println!("  {}", describe(run));
    }
    Ok(())
}

pub async fn cancel_active(ctx: &Context) -> Result<()> {
    let coordinator = ctx.run_coordinator()?;
    let report = coordinator.cancel_active_runs().await?;

    for id in &report.cancelled {
        println!("Run {id} cancelado.");
    }
    for (id, error) in &report.failed {
        println!("Falha ao cancelar o run {id}: {error}");
    }

    if report.all_succeeded() {
        println!("Nenhum run ativo restante.");
        Ok(())
    } else {
        anyhow::bail!("{} run(s) could not be cancelled", report.failed.len())
    }
}

pub async fn inspect(ctx: &Context, run_id: &str) -> Result<()> {
    let coordinator = ctx.run_coordinator()?;
    let inspection = coordinator.inspect_run(run_id).await?;

    println!("{}", describe(&inspection.run));
    match inspection.decision {
        Some(decision) => {
            println!("  Tool call: {} ({})", decision.tool_call_id, decision.function_name);
            println!(
                "  Especialista: {}",
                decision.specialist.as_deref().unwrap_or("(não informado)")
            );
            if let Some(message) = decision.message {
                println!("  Mensagem: {message}");
            }
            if let Some(key) = decision.specialist.as_deref() {
                match coordinator.registry().resolve(key) {
                    Ok(handler) => println!("  Assistente: {handler}"),
                    Err(err) => println!("  {}", err.user_message()),
                }
            }
        }
        None => println!("  Nenhuma ação pendente."),
    }
    Ok(())
}

pub async fn new_thread(ctx: &Context) -> Result<()> {
    let thread = ctx.assistants_api()?.create_thread().await?;
    println!("Thread criada: {}", thread.id);
    println!("Defina assistants.thread_id = \"{}\" na configuração.", thread.id);
    Ok(())
}
