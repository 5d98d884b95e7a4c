//! Console dump of harvested logs for inspection

use std::io::{Read, Write};

use flate2::read::GzDecoder;

use crate::error::{HarvestError, HarvestResult};

pub const DUMP_BEGIN: &str = "------ BEGINNING LOG DUMP -----";
pub const DUMP_END: &str = "------ ENDING LOG DUMP -------";

/// Decode a log body as text
///
/// Bodies whose URL ends in `gz` are gunzipped first. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn decode_log_body(url: &str, body: &[u8]) -> HarvestResult<String> {
    if url.ends_with("gz") {
        let mut decoder = GzDecoder::new(body);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| HarvestError::Decode {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        return Ok(String::from_utf8_lossy(&out).into_owned());
    }
    Ok(String::from_utf8_lossy(body).into_owned())
}

/// Write a decoded log between dump banners
pub fn write_dump<W: Write>(out: &mut W, url: &str, text: &str) -> std::io::Result<()> {
    writeln!(out, "LogURL: {url}")?;
    writeln!(out, "{DUMP_BEGIN}")?;
    writeln!(out, "{text}")?;
    writeln!(out, "{DUMP_END}")?;
    out.flush()
}
