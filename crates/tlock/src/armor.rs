//! ASCII armor: PEM-style text framing over the binary envelope.
//!
//! Armor is a streaming adapter on either side of the binary codec; neither
//! direction buffers more than one 48-byte base64 line of the underlying
//! stream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::io::{self, BufRead, Read, Write};

const ARMOR_BEGIN: &str = "-----BEGIN AGE ENCRYPTED FILE-----";
const ARMOR_END: &str = "-----END AGE ENCRYPTED FILE-----";

/// Raw bytes per armor line (48 bytes encode to a 64-column line).
const BYTES_PER_LINE: usize = 48;
const COLUMNS: usize = 64;

/// Streaming armor encoder.
///
/// Call [`ArmorWriter::finish`] when done; dropping the writer without
/// finishing produces an incomplete armor block.
pub struct ArmorWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
    begun: bool,
}

impl<W: Write> ArmorWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(BYTES_PER_LINE),
            begun: false,
        }
    }

    fn begin_if_needed(&mut self) -> io::Result<()> {
        if !self.begun {
            self.inner.write_all(ARMOR_BEGIN.as_bytes())?;
            self.inner.write_all(b"\n")?;
            self.begun = true;
        }
        Ok(())
    }

    fn emit_line(&mut self, raw: &[u8]) -> io::Result<()> {
        self.inner.write_all(STANDARD.encode(raw).as_bytes())?;
        self.inner.write_all(b"\n")
    }

    /// Flush the partial final line and the end marker, returning the
    /// underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.begin_if_needed()?;
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit_line(&line)?;
        }
        self.inner.write_all(ARMOR_END.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ArmorWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.begin_if_needed()?;
        self.pending.extend_from_slice(buf);
        while self.pending.len() >= BYTES_PER_LINE {
            let rest = self.pending.split_off(BYTES_PER_LINE);
            let line = std::mem::replace(&mut self.pending, rest);
            self.emit_line(&line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streaming armor decoder.
pub struct ArmorReader<R: BufRead> {
    inner: R,
    decoded: Vec<u8>,
    pos: usize,
    state: State,
}

#[derive(PartialEq)]
enum State {
    Preamble,
    Body,
    Done,
}

impl<R: BufRead> ArmorReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            decoded: Vec::new(),
            pos: 0,
            state: State::Preamble,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        let n = self.inner.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn refill(&mut self) -> io::Result<()> {
        loop {
            let line = match self.next_line()? {
                Some(line) => line,
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "armor: missing end marker",
                    ))
                }
            };

            match self.state {
                State::Preamble => {
                    if line.is_empty() {
                        continue;
                    }
                    if line != ARMOR_BEGIN {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "armor: missing begin marker",
                        ));
                    }
                    self.state = State::Body;
                }
                State::Body => {
                    if line == ARMOR_END {
                        self.state = State::Done;
                        return Ok(());
                    }
                    if line.len() > COLUMNS {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            "armor: line too long",
                        ));
                    }
                    let raw = STANDARD.decode(line.as_bytes()).map_err(|_| {
                        io::Error::new(io::ErrorKind::InvalidData, "armor: invalid base64")
                    })?;
                    self.decoded = raw;
                    self.pos = 0;
                    return Ok(());
                }
                State::Done => unreachable!("refill is not called after the end marker"),
            }
        }
    }
}

impl<R: BufRead> Read for ArmorReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.decoded.len() {
            if self.state == State::Done {
                return Ok(0);
            }
            self.refill()?;
        }
        let n = (self.decoded.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.decoded[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn round_trip(data: &[u8]) -> Vec<u8> {
        let mut armored = ArmorWriter::new(Vec::new());
        armored.write_all(data).unwrap();
        let text = armored.finish().unwrap();

        let mut reader = ArmorReader::new(BufReader::new(text.as_slice()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_round_trip_sizes() {
        for size in [0usize, 1, 47, 48, 49, 1000] {
            let data: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
            assert_eq!(round_trip(&data), data, "size {size}");
        }
    }

    #[test]
    fn test_armor_shape() {
        let mut armored = ArmorWriter::new(Vec::new());
        armored.write_all(&[0u8; 60]).unwrap();
        let text = String::from_utf8(armored.finish().unwrap()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.first(), Some(&ARMOR_BEGIN));
        assert_eq!(lines.last(), Some(&ARMOR_END));
        assert_eq!(lines[1].len(), COLUMNS);
        assert!(lines[2].len() < COLUMNS);
    }

    #[test]
    fn test_empty_payload_still_framed() {
        let armored = ArmorWriter::new(Vec::new());
        let text = String::from_utf8(armored.finish().unwrap()).unwrap();
        assert_eq!(text, format!("{ARMOR_BEGIN}\n{ARMOR_END}\n"));
    }

    #[test]
    fn test_rejects_missing_begin() {
        let mut reader = ArmorReader::new(BufReader::new(&b"not armor\n"[..]));
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_rejects_missing_end() {
        let text = format!("{ARMOR_BEGIN}\nAAAA\n");
        let mut reader = ArmorReader::new(BufReader::new(text.as_bytes()));
        let mut out = Vec::new();
        assert!(reader.read_to_end(&mut out).is_err());
    }

    #[test]
    fn test_skips_leading_blank_lines() {
        let mut armored = ArmorWriter::new(Vec::new());
        armored.write_all(b"hello").unwrap();
        let mut text = b"\n\n".to_vec();
        text.extend_from_slice(&armored.finish().unwrap());

        let mut reader = ArmorReader::new(BufReader::new(text.as_slice()));
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello");
    }
}
