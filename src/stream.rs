use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use async_stream::try_stream;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, SeekFrom};
use tracing::{info, trace, warn};

use crate::error::{Error, Result};
use crate::range::ByteRange;
use crate::SeekableReader;

/// Bytes read per chunk unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Cooperative cancellation signal, polled once per chunk.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

impl<F: Fn() -> bool> Cancellation for F {
    fn is_cancelled(&self) -> bool {
        self()
    }
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

impl Cancellation for Arc<AtomicBool> {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// How a stream that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The whole span was written.
    Completed { written: u64 },
    /// The cancellation signal fired; `written` bytes reached the sink.
    Cancelled { written: u64 },
}

impl StreamOutcome {
    pub fn written(&self) -> u64 {
        match *self {
            StreamOutcome::Completed { written } | StreamOutcome::Cancelled { written } => written,
        }
    }
}

/// Reads a span from a seekable source in chunks of at most `chunk_size`
/// bytes, never past the end of the span.
pub(crate) struct ChunkReader<R> {
    source: R,
    chunk_size: usize,
    expected: u64,
    remaining: u64,
}

impl<R: SeekableReader> ChunkReader<R> {
    pub(crate) async fn seek(mut source: R, range: ByteRange, chunk_size: usize) -> io::Result<Self> {
        source.seek(SeekFrom::Start(range.start())).await?;
        Ok(ChunkReader {
            source,
            chunk_size,
            expected: range.len(),
            remaining: range.len(),
        })
    }

    pub(crate) fn written(&self) -> u64 {
        self.expected - self.remaining
    }

    /// Next chunk of the span, `None` once the span is exhausted. Fails with
    /// [`Error::ShortRead`] if the source hits end-of-data first.
    pub(crate) async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        // remaining may exceed usize on 32-bit targets, chunk_size never does
        let want = usize::try_from(self.remaining)
            .map_or(self.chunk_size, |remaining| remaining.min(self.chunk_size));

        let mut chunk = BytesMut::zeroed(want);
        let mut filled = 0;
        while filled < want {
            match self.source.read(&mut chunk[filled..]).await? {
                0 => {
                    warn!(expected = self.expected, written = self.written(), "source ended before span was complete");
                    return Err(Error::ShortRead { expected: self.expected, written: self.written() });
                }
                n => filled += n,
            }
        }

        self.remaining -= want as u64;
        trace!(len = want, remaining = self.remaining, "read chunk");
        Ok(Some(chunk.freeze()))
    }
}

/// Writes exactly the bytes of `range` from `source` into `sink`, flushing
/// after every chunk.
///
/// `cancel` is checked before each chunk is read; once it reports
/// cancellation nothing further is written and `Ok(StreamOutcome::Cancelled)`
/// is returned. The source is dropped on every exit path.
pub async fn stream_range<R, W, C>(
    source: R,
    range: ByteRange,
    sink: &mut W,
    chunk_size: usize,
    cancel: &C,
) -> Result<StreamOutcome>
where
    R: SeekableReader,
    W: AsyncWrite + Unpin + ?Sized,
    C: Cancellation + ?Sized,
{
    if chunk_size == 0 {
        return Err(Error::InvalidChunkSize);
    }

    let mut chunks = ChunkReader::seek(source, range, chunk_size).await?;
    loop {
        if cancel.is_cancelled() {
            info!(written = chunks.written(), expected = range.len(), "delivery cancelled");
            return Ok(StreamOutcome::Cancelled { written: chunks.written() });
        }

        match chunks.next_chunk().await? {
            Some(chunk) => {
                sink.write_all(&chunk).await?;
                sink.flush().await?;
            }
            None => return Ok(StreamOutcome::Completed { written: chunks.written() }),
        }
    }
}

/// Response body stream over one span. Implements [`Stream`].
///
/// Yields the same chunks as [`stream_range`]. There is no cancellation
/// polling: the server drops the stream, and with it the source, when the
/// client goes away.
pub struct ChunkStream {
    length: u64,
    inner: Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>,
}

impl ChunkStream {
    pub fn new<R>(source: R, range: ByteRange, chunk_size: usize) -> Self
    where
        R: SeekableReader + Send + 'static,
    {
        let inner = read_chunks(source, range, chunk_size.max(1));
        ChunkStream { length: range.len(), inner: Box::pin(inner) }
    }

    /// Total number of bytes the stream yields when it completes.
    pub fn len(&self) -> u64 {
        self.length
    }
}

fn read_chunks<R>(source: R, range: ByteRange, chunk_size: usize) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    R: SeekableReader + Send + 'static,
{
    try_stream! {
        let mut chunks = ChunkReader::seek(source, range, chunk_size).await?;
        while let Some(chunk) = chunks.next_chunk().await? {
            yield chunk;
        }
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("length", &self.length)
            .finish()
    }
}

impl Stream for ChunkStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use assert_matches::assert_matches;
    use bytes::Bytes;
    use futures::{pin_mut, Stream, StreamExt};
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    use crate::error::Error;
    use crate::range::ByteRange;
    use super::*;

    fn data(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn range(start: u64, end: u64, size: u64) -> ByteRange {
        ByteRange::new(start, end, size).unwrap()
    }

    async fn collect_stream(stream: impl Stream<Item = io::Result<Bytes>>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        pin_mut!(stream);
        while let Some(chunk) = stream.next().await.transpose()? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    /// Sink recording the size of every write and how many flushes it saw.
    #[derive(Default)]
    struct RecordingSink {
        bytes: Vec<u8>,
        writes: Vec<usize>,
        flushes: usize,
    }

    impl AsyncWrite for RecordingSink {
        fn poll_write(mut self: Pin<&mut Self>, _: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            self.bytes.extend_from_slice(buf);
            self.writes.push(buf.len());
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(mut self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.flushes += 1;
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Source that hands out at most `step` bytes per read.
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        step: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
            let step = self.step.min(buf.remaining());
            let mut limited = ReadBuf::new(buf.initialize_unfilled_to(step));
            let poll = Pin::new(&mut self.inner).poll_read(cx, &mut limited);
            let n = limited.filled().len();
            buf.advance(n);
            poll
        }
    }

    impl tokio::io::AsyncSeek for Trickle {
        fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
            Pin::new(&mut self.inner).start_seek(position)
        }

        fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
            Pin::new(&mut self.inner).poll_complete(cx)
        }
    }

    #[tokio::test]
    async fn test_full_span_in_chunks() {
        let source = data(10_000);
        let mut sink = RecordingSink::default();

        let outcome = stream_range(Cursor::new(source.clone()), range(0, 9_999, 10_000), &mut sink, 4096, &|| false)
            .await
            .unwrap();

        assert_eq!(StreamOutcome::Completed { written: 10_000 }, outcome);
        assert_eq!(source, sink.bytes);
        assert_eq!(vec![4096, 4096, 1808], sink.writes);
        assert_eq!(3, sink.flushes);
    }

    #[tokio::test]
    async fn test_partial_span_is_exact() {
        let source = data(1000);
        let mut sink = RecordingSink::default();

        let outcome = stream_range(Cursor::new(source.clone()), range(100, 599, 1000), &mut sink, 64, &|| false)
            .await
            .unwrap();

        assert_eq!(500, outcome.written());
        assert_eq!(&source[100..600], &sink.bytes[..]);
        assert!(sink.writes.iter().all(|&len| len <= 64));
    }

    #[tokio::test]
    async fn test_span_ends_before_source() {
        // the source has more data after the span; none of it may leak out
        let source = data(1000);
        let mut sink = RecordingSink::default();

        stream_range(Cursor::new(source.clone()), range(0, 4, 1000), &mut sink, 4096, &|| false)
            .await
            .unwrap();

        assert_eq!(&source[..5], &sink.bytes[..]);
        assert_eq!(vec![5], sink.writes);
    }

    #[tokio::test]
    async fn test_single_byte() {
        let source = data(1000);
        let mut sink = RecordingSink::default();

        stream_range(Cursor::new(source.clone()), range(999, 999, 1000), &mut sink, 4096, &|| false)
            .await
            .unwrap();

        assert_eq!(vec![source[999]], sink.bytes);
    }

    #[tokio::test]
    async fn test_short_reads_are_filled() {
        let source = data(1000);
        let trickle = Trickle { inner: Cursor::new(source.clone()), step: 7 };
        let mut sink = RecordingSink::default();

        stream_range(trickle, range(10, 209, 1000), &mut sink, 64, &|| false)
            .await
            .unwrap();

        assert_eq!(&source[10..210], &sink.bytes[..]);
        assert_eq!(vec![64, 64, 64, 8], sink.writes);
    }

    #[tokio::test]
    async fn test_source_ends_early() {
        // resource claims 1000 bytes but only 600 remain
        let source = data(600);
        let mut sink = RecordingSink::default();

        let err = stream_range(Cursor::new(source.clone()), range(0, 999, 1000), &mut sink, 256, &|| false)
            .await
            .unwrap_err();

        assert_matches!(err, Error::ShortRead { expected: 1000, written: 512 });
        assert_eq!(&source[..512], &sink.bytes[..]);
    }

    #[tokio::test]
    async fn test_cancel_before_first_chunk() {
        let mut sink = RecordingSink::default();

        let outcome = stream_range(Cursor::new(data(1000)), range(0, 999, 1000), &mut sink, 100, &|| true)
            .await
            .unwrap();

        assert_eq!(StreamOutcome::Cancelled { written: 0 }, outcome);
        assert!(sink.bytes.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream() {
        let polls = AtomicUsize::new(0);
        let cancel = || polls.fetch_add(1, Ordering::SeqCst) >= 3;
        let mut sink = RecordingSink::default();

        let outcome = stream_range(Cursor::new(data(1000)), range(0, 999, 1000), &mut sink, 100, &cancel)
            .await
            .unwrap();

        assert_eq!(StreamOutcome::Cancelled { written: 300 }, outcome);
        assert_eq!(300, sink.bytes.len());
        assert_eq!(4, polls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_with_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut sink = RecordingSink::default();

        let outcome = stream_range(Cursor::new(data(10)), range(0, 9, 10), &mut sink, 4, &flag)
            .await
            .unwrap();

        assert_matches!(outcome, StreamOutcome::Cancelled { written: 0 });
    }

    #[tokio::test]
    async fn test_zero_chunk_size() {
        let mut sink = RecordingSink::default();
        let result = stream_range(Cursor::new(data(10)), range(0, 9, 10), &mut sink, 0, &|| false).await;
        assert_matches!(result, Err(Error::InvalidChunkSize));
    }

    #[tokio::test]
    async fn test_chunk_stream() {
        let source = data(10_000);
        let stream = ChunkStream::new(Cursor::new(source.clone()), range(1_000, 8_999, 10_000), 4096);
        assert_eq!(8_000, stream.len());

        let sizes: Vec<usize> = ChunkStream::new(Cursor::new(source.clone()), range(1_000, 8_999, 10_000), 4096)
            .map(|chunk| chunk.unwrap().len())
            .collect()
            .await;
        assert_eq!(vec![4096, 3904], sizes);

        assert_eq!(&source[1_000..9_000], &collect_stream(stream).await.unwrap()[..]);
    }

    #[tokio::test]
    async fn test_chunk_stream_short_read() {
        let stream = ChunkStream::new(Cursor::new(data(50)), range(0, 99, 100), 16);
        let err = collect_stream(stream).await.unwrap_err();
        assert_eq!(io::ErrorKind::UnexpectedEof, err.kind());
    }
}
