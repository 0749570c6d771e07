// Length-delimited packet framing over a byte stream.
//
// A frame is a 4-byte big-endian length followed by that many bytes of
// packet (see `codec.rs` for what a packet contains). Framing knows nothing
// about packet contents; it only turns a reliable ordered stream into a
// sequence of byte buffers and back.
//
// Receivers pass an explicit size cap (`NetConfig::max_message_size` in the
// net crate, defaulting to `MAX_MESSAGE_SIZE`). A length prefix above the cap
// is `InvalidData`, never an allocation. The biggest legitimate frames are
// `LinesAdded` batches in the join dump.

use std::io::{self, Read, Write};

/// Default frame size cap (16 MB).
pub const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Write one frame and flush.
pub fn write_frame<W: Write>(writer: &mut W, packet: &[u8]) -> io::Result<()> {
    let len = u32::try_from(packet.len())
        .ok()
        .filter(|len| *len <= MAX_MESSAGE_SIZE)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "packet too large: {} bytes (max {MAX_MESSAGE_SIZE})",
                    packet.len()
                ),
            )
        })?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(packet)?;
    writer.flush()
}

/// Read one frame of at most `max_len` bytes.
///
/// Returns `UnexpectedEof` if the stream closes before or inside a frame; a
/// partially received frame is discarded with the error.
pub fn read_frame<R: Read>(reader: &mut R, max_len: u32) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes (max {max_len})"),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn frames_in_sequence() {
        let packets: Vec<&[u8]> = vec![b"first", b"", b"third"];
        let mut buf = Vec::new();
        for p in &packets {
            write_frame(&mut buf, p).unwrap();
        }

        let mut cursor = Cursor::new(&buf);
        for expected in &packets {
            let got = read_frame(&mut cursor, MAX_MESSAGE_SIZE).unwrap();
            assert_eq!(got, *expected);
        }
        let err = read_frame(&mut cursor, MAX_MESSAGE_SIZE).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn rejects_oversized_write() {
        let big = vec![0u8; MAX_MESSAGE_SIZE as usize + 1];
        let err = write_frame(&mut Vec::<u8>::new(), &big).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn respects_reader_cap() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[7u8; 64]).unwrap();
        let err = read_frame(&mut Cursor::new(&buf), 63).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(read_frame(&mut Cursor::new(&buf), 64).unwrap().len(), 64);
    }

    #[test]
    fn partial_frame_is_eof() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        buf.truncate(6);
        let err = read_frame(&mut Cursor::new(&buf), MAX_MESSAGE_SIZE).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
