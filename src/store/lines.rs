//! Newline-split reading for the text formats.
//!
//! A line that is not valid UTF-8 is a malformed record, not an I/O failure:
//! it comes back as `Ok(Err(KmError::Parse))` so loaders skip it like any other
//! bad line. Only real read errors surface as the outer `Err`.

use std::io::{self, BufRead};

use crate::error::{KmError, Result};

/// Lines of `reader` without the trailing `\n` / `\r\n`
pub fn decoded_lines<R: BufRead>(reader: R) -> impl Iterator<Item = io::Result<Result<String>>> {
  reader.split(b'\n').map(|raw| {
    raw.map(|mut bytes| {
      if bytes.last() == Some(&b'\r') {
        bytes.pop();
      }
      String::from_utf8(bytes).map_err(|e| {
        let shown = String::from_utf8_lossy(e.as_bytes()).into_owned();
        KmError::parse(&shown, "line is not valid UTF-8")
      })
    })
  })
}
