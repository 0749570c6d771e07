// Binary layouts for the protocol value types in `types.rs`.
//
// Enums are written as a single discriminant byte. `ElementData` is the only
// version-dependent layout: protocol version 1 carried id, type, position,
// layer, name and face size; version 2 appended angle, both flip flags and
// the attribute list. A v1 reader fills the v2 fields with neutral values
// (no rotation, no flips, no attributes) because v1 peers never had them,
// not because the bytes might be missing.

use crate::codec::{CodecError, PacketReader, PacketWriter, WireValue};
use crate::types::*;

/// First protocol version whose element payload carries rotation, flips and
/// attributes.
pub const ELEMENT_EXTRAS_SINCE: u32 = 2;

impl WireValue for ElementId {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_u64(self.0);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(ElementId(r.read_u64()?))
    }
}

impl WireValue for PlayerId {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_i32(self.0);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(PlayerId(r.read_i32()?))
    }
}

impl WireValue for Point {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_i32(self.x);
        w.write_i32(self.y);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Point {
            x: r.read_i32()?,
            y: r.read_i32()?,
        })
    }
}

impl WireValue for Rect {
    fn write_to(&self, w: &mut PacketWriter) {
        self.origin.write_to(w);
        w.write_i32(self.width);
        w.write_i32(self.height);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Rect {
            origin: r.read()?,
            width: r.read_i32()?,
            height: r.read_i32()?,
        })
    }
}

impl WireValue for Color {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_u32(self.0);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Color(r.read_u32()?))
    }
}

/// Generates a one-byte discriminant layout for a fieldless enum.
macro_rules! wire_enum {
    ($ty:ident { $($variant:ident = $value:literal),+ $(,)? }) => {
        impl WireValue for $ty {
            fn write_to(&self, w: &mut PacketWriter) {
                let byte: u8 = match self {
                    $($ty::$variant => $value,)+
                };
                w.write_u8(byte);
            }

            fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
                match r.read_u8()? {
                    $($value => Ok($ty::$variant),)+
                    other => Err(CodecError::InvalidDiscriminant {
                        what: stringify!($ty),
                        value: u32::from(other),
                    }),
                }
            }
        }
    };
}

wire_enum!(Layer {
    Underlay = 0,
    Environment = 1,
    Overlay = 2,
    Pog = 3,
});

wire_enum!(GridMode {
    None = 0,
    Square = 1,
    Hex = 2,
});

wire_enum!(BackgroundColor {
    Default = 0,
    Black = 1,
    White = 2,
    Grass = 3,
    Stone = 4,
    Water = 5,
    Wood = 6,
});

wire_enum!(RejectReason {
    WrongPassword = 0,
    VersionMismatch = 1,
    SessionFull = 2,
});

impl WireValue for Background {
    fn write_to(&self, w: &mut PacketWriter) {
        match self {
            Background::Color(color) => {
                w.write_u8(0);
                color.write_to(w);
            }
            Background::ElementType(name) => {
                w.write_u8(1);
                w.write_str(name);
            }
        }
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(Background::Color(r.read()?)),
            1 => Ok(Background::ElementType(r.read_string()?)),
            other => Err(CodecError::InvalidDiscriminant {
                what: "Background",
                value: u32::from(other),
            }),
        }
    }
}

impl WireValue for Attribute {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_str(&self.key);
        w.write_str(&self.value);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(Attribute {
            key: r.read_string()?,
            value: r.read_string()?,
        })
    }
}

impl WireValue for ElementData {
    fn write_to(&self, w: &mut PacketWriter) {
        self.id.write_to(w);
        w.write_str(&self.type_name);
        self.position.write_to(w);
        self.layer.write_to(w);
        w.write_str(&self.name);
        w.write_f64(self.face_size);
        if w.version() >= ELEMENT_EXTRAS_SINCE {
            w.write_f64(self.angle);
            w.write_bool(self.flip_h);
            w.write_bool(self.flip_v);
            w.write_seq(&self.attributes);
        }
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        let id = r.read()?;
        let type_name = r.read_string()?;
        let position = r.read()?;
        let layer = r.read()?;
        let name = r.read_string()?;
        let face_size = r.read_f64()?;
        let (angle, flip_h, flip_v, attributes) = if r.version() >= ELEMENT_EXTRAS_SINCE {
            (r.read_f64()?, r.read_bool()?, r.read_bool()?, r.read_seq()?)
        } else {
            (0.0, false, false, Vec::new())
        };
        Ok(ElementData {
            id,
            type_name,
            position,
            layer,
            name,
            angle,
            flip_h,
            flip_v,
            face_size,
            attributes,
        })
    }
}

impl WireValue for LineData {
    fn write_to(&self, w: &mut PacketWriter) {
        self.start.write_to(w);
        self.end.write_to(w);
        self.color.write_to(w);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(LineData {
            start: r.read()?,
            end: r.read()?,
            color: r.read()?,
        })
    }
}

impl WireValue for PlayerData {
    fn write_to(&self, w: &mut PacketWriter) {
        w.write_str(&self.player_name);
        w.write_str(&self.character_name);
        self.id.write_to(w);
        w.write_bool(self.host);
    }

    fn read_from(r: &mut PacketReader<'_>) -> Result<Self, CodecError> {
        Ok(PlayerData {
            player_name: r.read_string()?,
            character_name: r.read_string()?,
            id: r.read()?,
            host: r.read_bool()?,
        })
    }
}
