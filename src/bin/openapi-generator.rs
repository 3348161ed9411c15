//! Write the OpenAPI document of the HTTP API to disk.

use utoipa::OpenApi;
use whose_song_back::services::documentation::ApiDoc;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json()?);
    Ok(())
}
