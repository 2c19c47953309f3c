use quire_core::models::ArticleDraft;
use quire_core::sync::Persistence;
use quire_core::{Article, HybridStorage};

use crate::cli::AddArgs;
use crate::commands::common::resolve_article_content;
use crate::error::CliError;

pub async fn run_add(args: AddArgs, storage: &HybridStorage) -> Result<(), CliError> {
    let content = resolve_article_content(&args.content)?;
    let article = build_article(args, content)?;

    let outcome = storage.save(article).await?;
    println!("{}", outcome.article.id);
    if outcome.persistence == Persistence::LocalPending {
        eprintln!("Saved locally; queued for sync");
    }
    Ok(())
}

pub fn build_article(args: AddArgs, content: String) -> Result<Article, CliError> {
    let draft = ArticleDraft {
        title: Some(args.title),
        content: Some(content),
        category: args.category,
        tags: args.tags,
        author: args.author,
        status: args.status,
        visibility: args.visibility,
        ..ArticleDraft::default()
    };
    Ok(Article::try_from(draft)?)
}
