use quire_core::{ArticleQuery, HybridStorage};

use crate::cli::ListArgs;
use crate::commands::common::{article_to_list_item, format_article_lines, ArticleListItem};
use crate::error::CliError;

pub async fn run_list(args: &ListArgs, storage: &HybridStorage) -> Result<(), CliError> {
    let query = list_query(args)?;
    if args.count {
        let count = storage.count(&query).await;
        if args.json {
            println!("{}", serde_json::json!({ "count": count }));
        } else {
            println!("{count}");
        }
        return Ok(());
    }

    let articles = storage.list(&query).await;

    if args.json {
        let json_items = articles
            .iter()
            .map(article_to_list_item)
            .collect::<Vec<ArticleListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if articles.is_empty() {
        println!("No articles found.");
    } else {
        for line in format_article_lines(&articles) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn list_query(args: &ListArgs) -> Result<ArticleQuery, CliError> {
    Ok(ArticleQuery {
        status: args.status.as_deref().map(str::parse).transpose()?,
        category: args.category.clone(),
        visibility: args.visibility.as_deref().map(str::parse).transpose()?,
        search: args.search.clone(),
        limit: Some(args.limit),
        offset: (args.offset > 0).then_some(args.offset),
    })
}
