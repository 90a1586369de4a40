use super::{enrich, log_total, post_limit, save, select_actor, time_window, Context, WindowArgs};
use crate::prompt;
use anyhow::Result;
use bsky_archive_lib::output::handle_slug;
use bsky_archive_lib::thread::EnrichOptions;
use bsky_archive_lib::{sources, Archive};
use clap::Args;
use std::time::Instant;
use tracing::info;

#[derive(Args, Debug)]
pub struct UserArgs {
    /// Handle to archive (e.g., nasa.bsky.social)
    pub handle: Option<String>,

    /// Search users by name or keyword and pick one
    #[arg(long, conflicts_with = "handle")]
    pub search: Option<String>,

    /// Maximum number of posts to fetch
    #[arg(short = 'n', long)]
    pub max: Option<usize>,

    /// Fetch every post in the window without asking for a limit
    #[arg(long, conflicts_with = "max")]
    pub all: bool,

    #[command(flatten)]
    pub window: WindowArgs,
}

pub async fn run(ctx: &Context, args: UserArgs) -> Result<()> {
    let handle = match (args.handle, args.search) {
        (Some(handle), _) => Some(handle.trim_start_matches('@').to_string()),
        (None, Some(query)) => select_actor(&ctx.client, Some(query)).await?,
        (None, None) => choose_handle(ctx).await?,
    };
    let Some(handle) = handle.filter(|h| !h.is_empty()) else {
        info!("No user selected. Exiting.");
        return Ok(());
    };

    let window = time_window(&args.window)?;
    let max = post_limit(
        args.max,
        args.all,
        "Maximum number of posts to fetch (leave blank for all): ",
    )?;

    let started = Instant::now();
    let posts =
        sources::get_author_feed(&ctx.client, &handle, window.unwrap_or_default(), max).await;
    info!(
        "Fetched {} posts for @{} in {:.2} seconds",
        posts.len(),
        handle,
        started.elapsed().as_secs_f64()
    );
    if posts.is_empty() {
        info!("No posts found for @{} in the selected window.", handle);
        return Ok(());
    }

    let posts = enrich(ctx, posts, ctx.enrich_options(EnrichOptions::default())).await?;
    log_total(started);

    let archive = Archive::new(
        ctx.output_dir("user_model", "user_model_unauth"),
        &format!("posts_{}", handle_slug(&handle)),
    );
    save(&archive, &posts);
    Ok(())
}

async fn choose_handle(ctx: &Context) -> Result<Option<String>> {
    loop {
        println!("\nHow would you like to find the user?");
        println!("[1] Enter a handle directly");
        println!("[2] Search for a user by name or keyword");

        match prompt::ask("Enter your choice (1 or 2): ")?.as_str() {
            "1" => {
                let handle = prompt::ask("Enter the user's handle (e.g., nasa.bsky.social): ")?;
                return Ok(Some(handle.trim_start_matches('@').to_string()));
            }
            "2" => return select_actor(&ctx.client, None).await,
            _ => println!("Invalid choice. Please enter 1 or 2."),
        }
    }
}
