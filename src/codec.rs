use bytes::{Buf, BytesMut};
use memchr::memchr2;
use std::io;
use thiserror::Error;
use tokio_util::codec::Decoder;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One physical line, numbered from 1, without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: u64,
    pub text: String,
}

/// A line that could not be turned into text. Only that line is lost.
#[derive(Debug, Error)]
pub enum LineError {
    #[error("line {line} is not valid text: {source}")]
    InvalidText {
        line: u64,
        source: std::str::Utf8Error,
    },
    #[error("line {line} exceeds the maximum length of {limit} bytes")]
    TooLong { line: u64, limit: usize },
}

impl LineError {
    pub fn line(&self) -> u64 {
        match self {
            LineError::InvalidText { line, .. } | LineError::TooLong { line, .. } => *line,
        }
    }
}

/// Frames produced by [`LineDecoder`]. Faults are values, not stream errors.
#[derive(Debug)]
pub enum LineFrame {
    Line(Line),
    Fault(LineError),
}

/// Splits a UTF-8 byte stream on `\n`, `\r\n` or a lone `\r`.
///
/// Lines longer than `max_len` bytes are discarded up to their terminator and
/// reported as a single [`LineError::TooLong`].
#[derive(Debug)]
pub struct LineDecoder {
    max_len: usize,
    next_number: u64,
    // bytes of the buffer already known to hold no terminator
    next_index: usize,
    discarding: bool,
}

impl LineDecoder {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len,
            next_number: 1,
            next_index: 0,
            discarding: false,
        }
    }

    fn take_number(&mut self) -> u64 {
        let number = self.next_number;
        self.next_number += 1;
        number
    }

    fn frame(&mut self, raw: &[u8]) -> LineFrame {
        let number = self.take_number();
        let mut raw = raw;
        if number == 1 {
            raw = raw.strip_prefix(UTF8_BOM).unwrap_or(raw);
        }
        if raw.len() > self.max_len {
            return LineFrame::Fault(LineError::TooLong {
                line: number,
                limit: self.max_len,
            });
        }
        match std::str::from_utf8(raw) {
            Ok(text) => LineFrame::Line(Line {
                number,
                text: text.to_string(),
            }),
            Err(source) => LineFrame::Fault(LineError::InvalidText {
                line: number,
                source,
            }),
        }
    }

    fn too_long(&mut self) -> LineFrame {
        self.discarding = false;
        let line = self.take_number();
        LineFrame::Fault(LineError::TooLong {
            line,
            limit: self.max_len,
        })
    }
}

/// Length of the terminator at `pos`, or `None` when a `\r` ends the buffer
/// and may be the first half of a `\r\n` split across reads.
fn terminator_len(src: &[u8], pos: usize) -> Option<usize> {
    match (src[pos], src.get(pos + 1)) {
        (b'\r', Some(b'\n')) => Some(2),
        (b'\r', None) => None,
        _ => Some(1),
    }
}

impl Decoder for LineDecoder {
    type Item = LineFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.discarding {
            return match memchr2(b'\n', b'\r', src) {
                Some(pos) => match terminator_len(src, pos) {
                    Some(len) => {
                        src.advance(pos + len);
                        Ok(Some(self.too_long()))
                    }
                    None => {
                        src.advance(pos);
                        Ok(None)
                    }
                },
                None => {
                    src.clear();
                    Ok(None)
                }
            };
        }

        // room for the longest allowed line plus "\r\n"
        let window = self.max_len.saturating_add(2);
        let search_end = src.len().min(window);
        if let Some(offset) = memchr2(b'\n', b'\r', &src[self.next_index..search_end]) {
            let pos = self.next_index + offset;
            let Some(len) = terminator_len(src, pos) else {
                self.next_index = pos;
                return Ok(None);
            };
            let line = src.split_to(pos + len);
            self.next_index = 0;
            return Ok(Some(self.frame(&line[..pos])));
        }
        if search_end == window {
            src.advance(search_end);
            self.next_index = 0;
            self.discarding = true;
            return self.decode(src);
        }
        self.next_index = search_end;
        Ok(None)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if self.discarding {
            buf.clear();
            return Ok(Some(self.too_long()));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        self.next_index = 0;
        Ok(Some(self.frame(rest.strip_suffix(b"\r").unwrap_or(&rest[..]))))
    }
}

/// Re-encodes a non-UTF-8 byte stream into UTF-8 chunks.
pub struct Transcoder {
    decoder: encoding_rs::Decoder,
}

impl Transcoder {
    pub fn new(encoding: &'static encoding_rs::Encoding) -> Self {
        Self {
            decoder: encoding.new_decoder(),
        }
    }

    fn transcode(&mut self, src: &mut BytesMut, last: bool) -> Option<BytesMut> {
        let capacity = self
            .decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or_else(|| src.len() * 3 + 4);
        let mut out = vec![0; capacity];
        // with a worst-case sized output the decoder consumes all of `src`;
        // partial sequences are held inside the decoder until more input arrives
        let (_result, read, written, _replaced) = self.decoder.decode_to_utf8(src, &mut out, last);
        src.advance(read);
        (written > 0).then(|| BytesMut::from(&out[..written]))
    }
}

impl Decoder for Transcoder {
    type Item = BytesMut;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }
        Ok(self.transcode(src, false))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let out = self.transcode(buf, true);
        buf.clear();
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut LineDecoder, input: &[u8]) -> Vec<LineFrame> {
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        while let Some(frame) = decoder.decode_eof(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    fn texts(frames: &[LineFrame]) -> Vec<(u64, String)> {
        frames
            .iter()
            .filter_map(|f| match f {
                LineFrame::Line(line) => Some((line.number, line.text.clone())),
                LineFrame::Fault(_) => None,
            })
            .collect()
    }

    #[test]
    fn numbers_lines_and_strips_terminators() {
        let mut decoder = LineDecoder::new(64);
        let frames = drain(&mut decoder, b"a,b\r\n\nc,d\ne,f");
        assert_eq!(
            texts(&frames),
            vec![
                (1, "a,b".to_string()),
                (2, String::new()),
                (3, "c,d".to_string()),
                (4, "e,f".to_string()),
            ]
        );
    }

    #[test]
    fn bom_is_dropped_from_first_line() {
        let mut decoder = LineDecoder::new(64);
        let frames = drain(&mut decoder, b"\xEF\xBB\xBFage\n1\n");
        assert_eq!(texts(&frames)[0], (1, "age".to_string()));
    }

    #[test]
    fn invalid_utf8_faults_only_its_line() {
        let mut decoder = LineDecoder::new(64);
        let frames = drain(&mut decoder, b"ok\n\xff\xfe,x\nfine\n");
        assert_eq!(frames.len(), 3);
        assert!(matches!(
            &frames[1],
            LineFrame::Fault(LineError::InvalidText { line: 2, .. })
        ));
        assert_eq!(texts(&frames), vec![(1, "ok".to_string()), (3, "fine".to_string())]);
    }

    #[test]
    fn over_long_line_is_discarded_to_its_newline() {
        let mut decoder = LineDecoder::new(4);
        let mut input = b"abc\n".to_vec();
        input.extend(std::iter::repeat(b'x').take(50));
        input.extend(b"\nxyz\n");
        let frames = drain(&mut decoder, &input);
        assert!(matches!(
            &frames[1],
            LineFrame::Fault(LineError::TooLong { line: 2, limit: 4 })
        ));
        assert_eq!(texts(&frames), vec![(1, "abc".to_string()), (3, "xyz".to_string())]);
    }

    #[test]
    fn over_long_last_line_without_newline() {
        let mut decoder = LineDecoder::new(2);
        let frames = drain(&mut decoder, b"ab\nabcdefgh");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].line_number(), 2);
    }

    #[test]
    fn lone_carriage_return_ends_a_line() {
        let mut decoder = LineDecoder::new(64);
        let frames = drain(&mut decoder, b"h\ra,b\r\rc\r\nd\r");
        assert_eq!(
            texts(&frames),
            vec![
                (1, "h".to_string()),
                (2, "a,b".to_string()),
                (3, String::new()),
                (4, "c".to_string()),
                (5, "d".to_string()),
            ]
        );
    }

    #[test]
    fn crlf_split_across_reads_is_one_terminator() {
        let mut decoder = LineDecoder::new(64);
        let mut buf = BytesMut::from(&b"a,b\r"[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\nc,d\n");
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        assert_eq!(texts(&frames), vec![(1, "a,b".to_string()), (2, "c,d".to_string())]);
        assert!(decoder.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn over_long_line_ended_by_carriage_return() {
        let mut decoder = LineDecoder::new(4);
        let mut input = b"abc\r".to_vec();
        input.extend(std::iter::repeat(b'x').take(20));
        input.extend(b"\rxyz");
        let frames = drain(&mut decoder, &input);
        assert_eq!(frames.len(), 3);
        assert!(matches!(
            &frames[1],
            LineFrame::Fault(LineError::TooLong { line: 2, .. })
        ));
        assert_eq!(texts(&frames), vec![(1, "abc".to_string()), (3, "xyz".to_string())]);
    }

    #[test]
    fn transcodes_latin1() {
        let mut transcoder = Transcoder::new(encoding_rs::WINDOWS_1252);
        let mut buf = BytesMut::from(&b"Zo\xeb"[..]);
        let out = transcoder.decode_eof(&mut buf).unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&out).unwrap(), "Zoë");
    }

    impl LineFrame {
        fn line_number(&self) -> u64 {
            match self {
                LineFrame::Line(line) => line.number,
                LineFrame::Fault(err) => err.line(),
            }
        }
    }
}
