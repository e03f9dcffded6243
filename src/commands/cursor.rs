use anyhow::Result;

use crate::cursor::decode_cursor;

/// Decode a continuation token and print its contents as JSON.
pub async fn run(token: &str) -> Result<()> {
    let cursor = decode_cursor(token)?;
    println!("{}", serde_json::to_string_pretty(&cursor)?);
    Ok(())
}
