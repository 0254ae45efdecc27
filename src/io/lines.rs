use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Line reader that tolerates non-UTF-8 input
///
/// Invalid sequences are replaced rather than failing the read, since runner
/// output and result files are not guaranteed to be UTF-8. Partially read
/// bytes are kept between calls, so `next_line` is safe to use as a
/// `tokio::select!` branch.
pub struct LossyLines<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LossyLines<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or None at end of input
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 && self.buf.is_empty() {
            return Ok(None);
        }

        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}
