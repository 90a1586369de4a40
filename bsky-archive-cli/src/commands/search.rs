use super::{enrich, log_total, save, Context};
use crate::prompt;
use anyhow::Result;
use bsky_archive_lib::filter::{self, DateWindow};
use bsky_archive_lib::output::safe_query;
use bsky_archive_lib::thread::EnrichOptions;
use bsky_archive_lib::{sources, Archive, SearchSort};
use clap::{Args, ValueEnum};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

const DEFAULT_COUNT: usize = 500;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Top,
    Latest,
}

impl From<SortArg> for SearchSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Top => SearchSort::Top,
            SortArg::Latest => SearchSort::Latest,
        }
    }
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Words or "exact phrases" to search for
    pub terms: Option<String>,

    /// Words to exclude, separated by spaces or commas
    #[arg(long)]
    pub exclude: Option<String>,

    #[arg(long, value_enum)]
    pub sort: Option<SortArg>,

    /// Number of posts to fetch
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Keep only posts tagged with this language code (e.g. en)
    #[arg(long)]
    pub lang: Option<String>,

    /// Keep posts created on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from_date: Option<String>,

    /// Keep posts created on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to_date: Option<String>,

    /// Skip the language and date questions
    #[arg(long)]
    pub no_filters: bool,
}

pub async fn run(ctx: &Context, args: SearchArgs) -> Result<()> {
    let interactive = args.terms.is_none();
    let include = match args.terms {
        Some(terms) => terms,
        None => {
            println!("Use \"quotes\" for exact phrases.");
            prompt::ask("Enter words to include: ")?
        }
    };
    let exclude = match args.exclude {
        Some(exclude) => exclude,
        None if interactive => prompt::ask("Enter words to exclude (leave blank for none): ")?,
        None => String::new(),
    };
    let query = build_query(&include, &exclude);
    if query.is_empty() {
        info!("No search query provided. Exiting.");
        return Ok(());
    }

    let sort = match args.sort {
        Some(sort) => sort.into(),
        None => choose_sort()?,
    };
    let count = match args.count {
        Some(n) => n,
        None => prompt::count_or(
            &format!("How many posts to fetch? (default {}): ", DEFAULT_COUNT),
            DEFAULT_COUNT,
        )?,
    };

    let lang = match args.lang {
        Some(lang) => lang,
        None if args.no_filters => String::new(),
        None => prompt::ask("Filter by language code, e.g. 'en' (leave blank for all): ")?,
    };
    let dates = date_window(args.from_date, args.to_date, args.no_filters)?;

    let started = Instant::now();
    let posts = sources::search_posts(&ctx.client, &query, sort, count).await;
    info!(
        "Found {} posts in {:.2} seconds",
        posts.len(),
        started.elapsed().as_secs_f64()
    );

    let posts = apply_filters(posts, &lang, dates.as_ref());
    if posts.is_empty() {
        info!("No posts left to process.");
        return Ok(());
    }

    let posts = enrich(ctx, posts, ctx.enrich_options(EnrichOptions::default())).await?;
    log_total(started);

    let archive = Archive::new(
        ctx.output_dir("search_model", "search_model_public"),
        &format!("search_{}", safe_query(&query)),
    );
    save(&archive, &posts);
    Ok(())
}

/// Include terms followed by `-word` for every excluded word.
fn build_query(include: &str, exclude: &str) -> String {
    let excluded = exclude
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|w| w.trim().trim_start_matches('-'))
        .filter(|w| !w.is_empty())
        .map(|w| format!("-{}", w));

    std::iter::once(include.trim().to_string())
        .filter(|s| !s.is_empty())
        .chain(excluded)
        .collect::<Vec<_>>()
        .join(" ")
}

fn choose_sort() -> Result<SearchSort> {
    loop {
        match prompt::ask("Sort by [1] Top or [2] Latest? ")?.as_str() {
            "1" => return Ok(SearchSort::Top),
            "2" => return Ok(SearchSort::Latest),
            _ => println!("Invalid choice. Please enter 1 or 2."),
        }
    }
}

/// Date bounds from flags or prompts. Unparseable dates disable the filter.
fn date_window(
    from: Option<String>,
    to: Option<String>,
    no_filters: bool,
) -> Result<Option<DateWindow>> {
    let (from, to) = if from.is_some() || to.is_some() {
        (from.unwrap_or_default(), to.unwrap_or_default())
    } else if no_filters || !prompt::confirm("Filter by date? (y/n): ")? {
        return Ok(None);
    } else {
        (
            prompt::ask("Start date (YYYY-MM-DD, leave blank for no limit): ")?,
            prompt::ask("End date (YYYY-MM-DD, leave blank for no limit): ")?,
        )
    };

    match DateWindow::parse(&from, &to) {
        Ok(window) => Ok(Some(window)),
        Err(e) => {
            warn!("Invalid date ({:#}), skipping date filter", e);
            Ok(None)
        }
    }
}

fn apply_filters(posts: Vec<Value>, lang: &str, dates: Option<&DateWindow>) -> Vec<Value> {
    let mut posts = posts;
    if !lang.trim().is_empty() {
        let before = posts.len();
        posts = filter::by_language(posts, lang);
        info!(
            "Language filter '{}': kept {} of {} posts",
            lang.trim(),
            posts.len(),
            before
        );
    }
    if let Some(dates) = dates {
        let before = posts.len();
        posts = filter::by_date(posts, dates);
        info!("Date filter: kept {} of {} posts", posts.len(), before);
    }
    posts
}
