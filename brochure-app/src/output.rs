use std::io::Write;

use brochure_common::{BrochureError, Result};
use brochure_llm::traits::{ChatEvent, ChatStream};
use futures::StreamExt;

/// Write each fragment as it arrives and return the whole reply.
pub async fn print_stream<W: Write>(out: &mut W, mut stream: ChatStream) -> Result<String> {
    let mut text = String::new();
    while let Some(event) = stream.next().await {
        match event? {
            ChatEvent::Delta(fragment) => {
                out.write_all(fragment.as_bytes()).map_err(io_error)?;
                out.flush().map_err(io_error)?;
                text.push_str(&fragment);
            }
            ChatEvent::Done => return Ok(text),
        }
    }
    Err(BrochureError::Stream(
        "reply stream ended without an end marker".to_string(),
    ))
}

/// `=` rule framing a status line.
pub fn banner<W: Write>(out: &mut W, message: &str) -> std::io::Result<()> {
    let rule = "=".repeat(50);
    writeln!(out, "\n{rule}\n{message}\n{rule}\n")
}

fn io_error(e: std::io::Error) -> BrochureError {
    BrochureError::Other(e.into())
}
