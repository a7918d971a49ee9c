use anyhow::Result;

use super::Context;
use super::chat::display_name;

pub async fn list(ctx: &Context) -> Result<()> {
    let store = ctx.store().await?;
    let summaries = store.summaries().await?;

    if summaries.is_empty() {
        println!("Nenhuma conversa salva em {}.", store.dir().display());
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{}  {:<30} {:>4} mensagens  {}",
            summary.id,
            display_name(summary),
            summary.message_count,
            summary.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}
