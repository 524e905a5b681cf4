#![deny(warnings)]

//! Create the run store schema at the default location.

use persistence::default_sqlite_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = default_sqlite_url();
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"));
    if let Some(parent) = path.and_then(|p| std::path::Path::new(p).parent()) {
        std::fs::create_dir_all(parent)?;
    }
    let pool = persistence::init_db(url).await?;
    let runs = persistence::list_runs(&pool).await?;
    println!("run store ready at {} ({} runs)", url, runs.len());
    Ok(())
}
