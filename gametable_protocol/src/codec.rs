// Binary packet codec.
//
// Every packet is a 4-byte big-endian type tag followed by a fixed field
// sequence. `PacketWriter` appends typed fields; `PacketReader` consumes them
// in the same order. The field vocabulary is deliberately small: fixed-width
// big-endian integers, IEEE-754 doubles, one-byte booleans, u32-length-
// prefixed UTF-8 strings and u32-length-prefixed arrays.
//
// Readers are strict. Anything that does not parse exactly (short buffer,
// bad UTF-8, a bool byte other than 0/1, an enum discriminant out of range,
// leftover bytes after the last field) is a `CodecError`. There is no
// best-effort defaulting of missing trailing fields: the schema version a
// connection negotiated at join time (see `message.rs`) decides the exact
// layout, and the reader carries that version so version-dependent types can
// branch on it.
//
// See also: `wire.rs` for the layouts of the protocol value types,
// `message.rs` for the message catalog built on top of this.

use thiserror::Error;

use crate::message::MessageKind;

/// Upper bound on any decoded array length. A length prefix above this is
/// treated as corruption rather than an allocation request.
pub const MAX_ARRAY_LEN: usize = 1 << 20;

/// Errors raised while encoding or decoding a packet.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("packet truncated: needed {needed} bytes at offset {offset}, {remaining} left")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("packet too short to hold a type tag ({len} bytes)")]
    MissingTag { len: usize },

    #[error("unknown message type tag {tag}")]
    UnknownTag { tag: u32 },

    #[error("invalid UTF-8 in string field at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid boolean byte {value:#04x} at offset {offset}")]
    InvalidBool { offset: usize, value: u8 },

    #[error("invalid {what} discriminant {value}")]
    InvalidDiscriminant { what: &'static str, value: u32 },

    #[error("array length {len} exceeds limit {max}")]
    LengthOverflow { len: usize, max: usize },

    #[error("{count} trailing bytes after {kind:?}")]
    TrailingBytes { kind: MessageKind, count: usize },

    #[error("{kind:?} is not part of protocol version {version}")]
    Unsupported { kind: MessageKind, version: u32 },
}

/// A value with a fixed binary layout.
///
/// Implementations must read back exactly what they write for the same
/// protocol version.
pub trait WireValue: Sized {
    fn write_to(&self, w: &mut PacketWriter);
    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError>;
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Builds one packet. The type tag is written on construction.
pub struct PacketWriter {
    buf: Vec<u8>,
    version: u32,
}

impl PacketWriter {
    pub fn new(kind: MessageKind, version: u32) -> Self {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&kind.tag().to_be_bytes());
        Self { buf, version }
    }

    /// Protocol version this packet is being laid out for.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(u8::from(v));
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_bits().to_be_bytes());
    }

    pub fn write_len(&mut self, len: usize) {
        // Lengths above u32::MAX cannot occur for anything that fits in a
        // framed message; saturate rather than wrap.
        self.write_u32(u32::try_from(len).unwrap_or(u32::MAX));
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn write<T: WireValue>(&mut self, value: &T) {
        value.write_to(self);
    }

    pub fn write_seq<T: WireValue>(&mut self, items: &[T]) {
        self.write_len(items.len());
        for item in items {
            item.write_to(self);
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Cursor over one received packet, positioned after the type tag.
pub struct PacketReader<'a> {
    buf: &'a [u8],
    pos: usize,
    version: u32,
}

impl<'a> PacketReader<'a> {
    /// Split a packet into its raw type tag and a reader over the body.
    pub fn open(bytes: &'a [u8], version: u32) -> Result<(u32, Self), CodecError> {
        let Some((tag_bytes, _)) = bytes.split_first_chunk::<4>() else {
            return Err(CodecError::MissingTag { len: bytes.len() });
        };
        let tag = u32::from_be_bytes(*tag_bytes);
        Ok((
            tag,
            Self {
                buf: bytes,
                pos: 4,
                version,
            },
        ))
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail if any bytes are left unread.
    pub fn expect_end(&self, kind: MessageKind) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(CodecError::TrailingBytes { kind, count }),
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let buf = self.buf;
        let slice = &buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(CodecError::InvalidBool { offset, value }),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.take_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        Ok(f64::from_bits(u64::from_be_bytes(self.take_array()?)))
    }

    /// Read an array length and reject values that could not possibly be
    /// backed by the remaining bytes.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_u32()? as usize;
        if len > MAX_ARRAY_LEN {
            return Err(CodecError::LengthOverflow {
                len,
                max: MAX_ARRAY_LEN,
            });
        }
        Ok(len)
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    pub fn read<T: WireValue>(&mut self) -> Result<T, CodecError> {
        T::read_from(self)
    }

    pub fn read_seq<T: WireValue>(&mut self) -> Result<Vec<T>, CodecError> {
        let len = self.read_len()?;
        // Every element takes at least one byte, so cap the preallocation by
        // what is actually left in the buffer.
        let mut out = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            out.push(T::read_from(self)?);
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Primitive impls
// ---------------------------------------------------------------------------

impl WireValue for String {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_str(self);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        r.read_string()
    }
}

impl WireValue for bool {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_bool(*self);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        r.read_bool()
    }
}

impl<T: WireValue> WireValue for Option<T> {
    fn write_to(&self, w: &mut PacketWriter) {
        match self {
            Some(value) => {
                w.write_bool(true);
                value.write_to(w);
            }
            None => w.write_bool(false),
        }
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        if r.read_bool()? {
            Ok(Some(T::read_from(r)?))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(writer: PacketWriter) -> Vec<u8> {
        writer.finish()
    }

    #[test]
    fn tag_is_big_endian_prefix() {
        let bytes = body(PacketWriter::new(MessageKind::Ping, 2));
        assert_eq!(bytes, MessageKind::Ping.tag().to_be_bytes().to_vec());
        let (tag, reader) = PacketReader::open(&bytes, 2).unwrap();
        assert_eq!(tag, MessageKind::Ping.tag());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn fields_read_back_in_order() {
        let mut w = PacketWriter::new(MessageKind::Chat, 2);
        w.write_i32(-7);
        w.write_u64(u64::MAX - 1);
        w.write_f64(12.5);
        w.write_bool(true);
        w.write_str("héllo");
        let bytes = w.finish();

        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_u64().unwrap(), u64::MAX - 1);
        assert_eq!(r.read_f64().unwrap(), 12.5);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_string().unwrap(), "héllo");
        assert!(r.expect_end(MessageKind::Chat).is_ok());
    }

    #[test]
    fn missing_tag() {
        let err = PacketReader::open(&[0, 1], 2).err().unwrap();
        assert_eq!(err, CodecError::MissingTag { len: 2 });
    }

    #[test]
    fn truncated_integer() {
        let bytes = [0, 0, 0, 1, 0xAA];
        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        let err = r.read_i32().unwrap_err();
        assert!(matches!(err, CodecError::Truncated { needed: 4, remaining: 1, .. }));
    }

    #[test]
    fn bad_bool_byte() {
        let bytes = [0, 0, 0, 1, 2];
        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        assert!(matches!(r.read_bool(), Err(CodecError::InvalidBool { value: 2, .. })));
    }

    #[test]
    fn bad_utf8() {
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xC3, 0x28]);
        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        assert!(matches!(r.read_string(), Err(CodecError::InvalidUtf8 { .. })));
    }

    #[test]
    fn absurd_array_length_rejected_without_allocating() {
        let mut bytes = vec![0, 0, 0, 1];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        assert!(matches!(
            r.read_seq::<String>(),
            Err(CodecError::LengthOverflow { .. })
        ));
    }

    #[test]
    fn trailing_bytes_detected() {
        let bytes = [0, 0, 0, 1, 9];
        let (_, r) = PacketReader::open(&bytes, 2).unwrap();
        assert_eq!(
            r.expect_end(MessageKind::Ping),
            Err(CodecError::TrailingBytes {
                kind: MessageKind::Ping,
                count: 1
            })
        );
    }

    #[test]
    fn option_layout() {
        let mut w = PacketWriter::new(MessageKind::Ping, 2);
        w.write(&Some("x".to_string()));
        w.write(&None::<String>);
        let bytes = w.finish();
        let (_, mut r) = PacketReader::open(&bytes, 2).unwrap();
        assert_eq!(r.read::<Option<String>>().unwrap(), Some("x".into()));
        assert_eq!(r.read::<Option<String>>().unwrap(), None);
    }
}
