use quire_core::HybridStorage;

use crate::commands::common::{format_article_details, normalize_article_identifier, resolve_article};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, storage: &HybridStorage) -> Result<(), CliError> {
    let normalized_id = normalize_article_identifier(id)?;
    let article = resolve_article(&normalized_id, storage).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&article)?);
    } else {
        println!("{}", format_article_details(&article));
    }
    Ok(())
}
