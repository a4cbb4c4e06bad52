//! Merged output for several remote files
//!
//! Prints a `==> label <==` header whenever the producing source changes,
//! and decodes every source's bytes with its own streaming decoder so that
//! characters split across reads come out whole.

use std::collections::HashMap;

use encoding_rs::{CoderResult, Decoder, Encoding};
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Identity of a polled source, stable for the whole run
pub type SourceId = usize;

/// What was printed last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityState {
    /// Source of the last visible output
    pub last_active: Option<SourceId>,
    /// Last output did not end with a line terminator
    pub need_newline: bool,
}

/// Writes data from several sources into one stream
pub struct OutputMultiplexer<W> {
    writer: W,
    quiet: bool,
    activity: ActivityState,
    decoders: HashMap<SourceId, Decoder>,
}

impl<W: AsyncWrite + Unpin> OutputMultiplexer<W> {
    /// Set up header policy for the given sources.
    ///
    /// With a single source and no `verbose`, that source counts as already
    /// active so it never gets a header. `quiet` suppresses all headers.
    pub fn new(writer: W, quiet: bool, verbose: bool, sources: &[SourceId]) -> Self {
        let last_active = match sources {
            [only] if !verbose => Some(*only),
            _ => None,
        };
        Self {
            writer,
            quiet,
            activity: ActivityState {
                last_active,
                need_newline: false,
            },
            decoders: HashMap::new(),
        }
    }

    pub fn activity(&self) -> &ActivityState {
        &self.activity
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write `data` produced by `source`, preceded by a header if needed
    pub async fn write(
        &mut self,
        source: SourceId,
        label: &str,
        encoding: &'static Encoding,
        data: &[u8],
    ) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut text = String::new();
        if !self.quiet && self.activity.last_active != Some(source) {
            if self.activity.need_newline {
                self.activity.need_newline = false;
                text.push('\n');
            }
            text.push_str("==> ");
            text.push_str(label);
            text.push_str(" <==\n");
            self.activity.last_active = Some(source);
        }
        self.activity.need_newline |= data.last() != Some(&b'\n');

        self.decode_into(source, encoding, data, &mut text);
        self.writer.write_all(text.as_bytes()).await
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush().await
    }

    fn decode_into(
        &mut self,
        source: SourceId,
        encoding: &'static Encoding,
        data: &[u8],
        out: &mut String,
    ) {
        let decoder = self
            .decoders
            .entry(source)
            .or_insert_with(|| encoding.new_decoder_without_bom_handling());
        if decoder.encoding() != encoding {
            *decoder = encoding.new_decoder_without_bom_handling();
        }

        let mut input = data;
        loop {
            let room = decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len().saturating_mul(3));
            out.reserve(room);
            let (result, read, _had_errors) = decoder.decode_to_string(input, out, false);
            input = &input[read..];
            if result == CoderResult::InputEmpty {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    async fn write_all(
        mux: &mut OutputMultiplexer<Vec<u8>>,
        writes: &[(SourceId, &str, &str)],
    ) -> String {
        for (source, label, data) in writes {
            mux.write(*source, label, UTF_8, data.as_bytes()).await.unwrap();
        }
        String::from_utf8(mux.get_ref().clone()).unwrap()
    }

    #[tokio::test]
    async fn test_two_sources_in_order() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[0, 1]);
        let out = write_all(&mut mux, &[(0, "urlA", "hello\n"), (1, "urlB", "world")]).await;
        assert_eq!(out, "==> urlA <==\nhello\n==> urlB <==\nworld");
        assert_eq!(
            mux.activity(),
            &ActivityState {
                last_active: Some(1),
                need_newline: true
            }
        );
    }

    #[tokio::test]
    async fn test_same_source_never_repeats_header() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[0, 1]);
        let out = write_all(
            &mut mux,
            &[(0, "a", "one\n"), (0, "a", "two\n"), (0, "a", "three\n")],
        )
        .await;
        assert_eq!(out, "==> a <==\none\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_partial_line_gets_newline_before_next_header() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[0, 1]);
        let out = write_all(
            &mut mux,
            &[(0, "a", "par"), (0, "a", "tial"), (1, "b", "x\n"), (0, "a", "more\n")],
        )
        .await;
        assert_eq!(out, "==> a <==\npartial\n==> b <==\nx\n==> a <==\nmore\n");
    }

    #[tokio::test]
    async fn test_single_source_has_no_header() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[3]);
        let out = write_all(&mut mux, &[(3, "only", "data")]).await;
        assert_eq!(out, "data");
    }

    #[tokio::test]
    async fn test_verbose_single_source() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, true, &[0]);
        let out = write_all(&mut mux, &[(0, "only", "data\n"), (0, "only", "more\n")]).await;
        assert_eq!(out, "==> only <==\ndata\nmore\n");
    }

    #[tokio::test]
    async fn test_quiet_wins_over_verbose() {
        let mut mux = OutputMultiplexer::new(Vec::new(), true, true, &[0, 1, 2]);
        let out = write_all(
            &mut mux,
            &[(0, "a", "1"), (1, "b", "2"), (2, "c", "3\n"), (0, "a", "4\n")],
        )
        .await;
        assert_eq!(out, "123\n4\n");
    }

    #[tokio::test]
    async fn test_empty_write_changes_nothing() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[0, 1]);
        let out = write_all(&mut mux, &[(0, "a", "")]).await;
        assert_eq!(out, "");
        assert_eq!(mux.activity().last_active, None);
    }

    #[tokio::test]
    async fn test_split_multibyte_character() {
        let mut mux = OutputMultiplexer::new(Vec::new(), false, false, &[0]);
        let e_acute = "é".as_bytes();
        mux.write(0, "a", UTF_8, &e_acute[..1]).await.unwrap();
        mux.write(0, "a", UTF_8, &e_acute[1..]).await.unwrap();
        assert_eq!(String::from_utf8(mux.into_inner()).unwrap(), "é");
    }

    #[tokio::test]
    async fn test_per_source_encoding() {
        let mut mux = OutputMultiplexer::new(Vec::new(), true, false, &[0, 1]);
        mux.write(0, "latin", WINDOWS_1252, &[0x63, 0x61, 0x66, 0xe9])
            .await
            .unwrap();
        mux.write(1, "utf8", UTF_8, "|café".as_bytes()).await.unwrap();
        assert_eq!(String::from_utf8(mux.into_inner()).unwrap(), "café|café");
    }
}
