use quire_core::{Article, HybridStorage};

use crate::cli::EditArgs;
use crate::commands::common::{
    capture_editor_input_with_initial, normalize_article_identifier, resolve_article,
};
use crate::error::CliError;

pub async fn run_edit(args: EditArgs, storage: &HybridStorage) -> Result<(), CliError> {
    let normalized_id = normalize_article_identifier(&args.id)?;
    let article = resolve_article(&normalized_id, storage).await?;

    let updated = if args.has_field_changes() {
        apply_field_changes(article.clone(), args)?
    } else {
        let Some(edited_content) = capture_editor_input_with_initial(&article.content)? else {
            return Err(CliError::EmptyEditedContent);
        };
        let mut updated = article.clone();
        updated.content = edited_content;
        updated.excerpt.clear();
        updated.ensure_excerpt();
        updated
    };

    if updated == article {
        println!("{}", article.id);
        return Ok(());
    }

    let outcome = storage.save(updated).await?;
    println!("{}", outcome.article.id);
    Ok(())
}

pub fn apply_field_changes(mut article: Article, args: EditArgs) -> Result<Article, CliError> {
    if let Some(title) = args.title {
        article.title = title;
    }
    if let Some(status) = args.status {
        article.status = status.parse()?;
    }
    if let Some(visibility) = args.visibility {
        article.visibility = visibility.parse()?;
    }
    if !args.tags.is_empty() {
        article.tags = args.tags;
    }
    Ok(article)
}
