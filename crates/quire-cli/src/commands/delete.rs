use quire_core::sync::Persistence;
use quire_core::HybridStorage;

use crate::commands::common::{normalize_article_identifier, resolve_article};
use crate::error::CliError;

pub async fn run_delete(id: &str, storage: &HybridStorage) -> Result<(), CliError> {
    let normalized_id = normalize_article_identifier(id)?;
    let article = resolve_article(&normalized_id, storage).await?;

    let outcome = storage.delete(&article.id).await?;
    println!("{}", outcome.id);
    if outcome.persistence == Persistence::LocalPending {
        eprintln!("Deleted locally; queued for sync");
    }
    Ok(())
}
