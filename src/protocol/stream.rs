//! Incremental frame splitter
//!
//! [`FrameReader`] wraps an `AsyncRead` and yields one complete
//! delimited frame at a time, flag bytes included. TCP gives us
//! arbitrary chunk boundaries, so a frame may arrive split across many
//! reads or glued to the next one; the splitter keeps its state between
//! polls. Bytes outside a frame and frames that grow past the protocol
//! maximum are discarded and the splitter resynchronizes on the next
//! flag byte.

use std::{
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::io::{
    AsyncRead,
    ReadBuf,
};

use crate::protocol::{
    FLAG,
    MAX_PACKET_LENGTH,
};

const RECEIVE_BUFFER_SIZE: usize = 2048;

/// Worst case: every packet byte plus the checksum escaped to two
/// bytes, plus the two flags.
const MAX_FRAME_LENGTH: usize = 2 * (MAX_PACKET_LENGTH + 1) + 2;

pin_project! {
    #[derive(Debug)]
    pub struct FrameReader<R> {
        #[pin]
        reader: R,
        receive_buffer: ReceiveBuffer,
        splitter: FrameSplitter,
    }
}

impl<R> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            receive_buffer: Default::default(),
            splitter: Default::default(),
        }
    }
}

impl<R: AsyncRead> Stream for FrameReader<R> {
    type Item = Result<Vec<u8>, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let mut this = self.as_mut().project();

            if this.receive_buffer.has_data() {
                while let Some(byte) = this.receive_buffer.next_byte() {
                    if let Some(frame) = this.splitter.push(byte) {
                        return Poll::Ready(Some(Ok(frame)));
                    }
                }
            }
            else {
                // nothing buffered, receive some
                this.receive_buffer.reset();

                let mut read_buf = ReadBuf::new(&mut this.receive_buffer.buffer);
                match this.reader.poll_read(cx, &mut read_buf) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Err(error)) => return Poll::Ready(Some(Err(error))),
                    Poll::Ready(Ok(())) => {
                        let num_bytes_read = read_buf.filled().len();

                        // if no data was received, the underlying reader reached EOF
                        if num_bytes_read == 0 {
                            return Poll::Ready(None);
                        }

                        this.receive_buffer.write_pos = num_bytes_read;
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
struct ReceiveBuffer {
    buffer: [u8; RECEIVE_BUFFER_SIZE],
    read_pos: usize,
    write_pos: usize,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self {
            buffer: [0; RECEIVE_BUFFER_SIZE],
            read_pos: 0,
            write_pos: 0,
        }
    }
}

impl ReceiveBuffer {
    #[inline(always)]
    fn has_data(&self) -> bool {
        self.read_pos < self.write_pos
    }

    #[inline(always)]
    fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    #[inline(always)]
    fn next_byte(&mut self) -> Option<u8> {
        self.has_data().then(|| {
            let byte = self.buffer[self.read_pos];
            self.read_pos += 1;
            byte
        })
    }
}

#[derive(Debug, Default)]
struct FrameSplitter {
    in_frame: bool,
    frame: Vec<u8>,
}

impl FrameSplitter {
    /// Feeds one byte, returning a complete raw frame when this byte
    /// closes one.
    fn push(&mut self, byte: u8) -> Option<Vec<u8>> {
        if self.in_frame {
            self.frame.push(byte);

            if byte == FLAG {
                if self.frame.len() == 2 {
                    // two adjacent flags: the closing flag of the
                    // previous frame doubling as our opening flag
                    self.frame.truncate(1);
                    return None;
                }

                self.in_frame = false;
                return Some(std::mem::take(&mut self.frame));
            }

            if self.frame.len() > MAX_FRAME_LENGTH {
                tracing::warn!(
                    length = self.frame.len(),
                    "discarding oversized frame, resynchronizing"
                );
                self.frame.clear();
                self.in_frame = false;
            }

            None
        }
        else if byte == FLAG {
            self.in_frame = true;
            self.frame.clear();
            self.frame.push(FLAG);
            None
        }
        else {
            // garbage between frames
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;

    use crate::protocol::seal_frame;

    use super::*;

    #[tokio::test]
    async fn it_splits_consecutive_frames() {
        let first = seal_frame(&[0x00; 13]);
        let second = seal_frame(&[0x01; 13]);

        let mut input = first.clone();
        input.extend_from_slice(&second);

        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.try_next().await.unwrap().unwrap(), first);
        assert_eq!(reader.try_next().await.unwrap().unwrap(), second);
        assert!(reader.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn it_skips_garbage_between_frames() {
        let frame = seal_frame(&[0x42; 13]);

        let mut input = vec![0x00, 0x13, 0x37];
        input.extend_from_slice(&frame);
        input.extend_from_slice(&[0xff, 0xff]);

        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.try_next().await.unwrap().unwrap(), frame);
        assert!(reader.try_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn adjacent_flags_do_not_produce_empty_frames() {
        let frame = seal_frame(&[0x42; 13]);

        // 7e 7e directly in front of a real frame
        let mut input = vec![FLAG, FLAG];
        input.extend_from_slice(&frame);

        let mut reader = FrameReader::new(input.as_slice());
        assert_eq!(reader.try_next().await.unwrap().unwrap(), frame);
        assert!(reader.try_next().await.unwrap().is_none());
    }

    #[test]
    fn it_reassembles_split_frames() {
        let frame = seal_frame(&[0x42; 13]);
        let mut splitter = FrameSplitter::default();

        let mut frames = Vec::new();
        for &byte in &frame {
            if let Some(complete) = splitter.push(byte) {
                frames.push(complete);
            }
        }

        assert_eq!(frames, vec![frame]);
    }
}
