//! EXIF orientation and HEIF `irot`/`imir` transforms
//!
//! AVIF carries display orientation as two item properties instead of an EXIF
//! tag: `irot` rotates by quarter turns anti-clockwise and `imir` mirrors
//! about one axis. Rotation is applied before mirroring. Every EXIF code maps
//! to exactly one canonical combination; reading back also accepts the
//! non-canonical combinations other writers produce.

use libavif_sys as sys;

/// EXIF orientation (tag 0x0112)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Orientation {
    /// 1: no transform
    #[default]
    Normal = 1,
    /// 2: mirrored left to right
    FlipHorizontal = 2,
    /// 3: rotated 180°
    Rotate180 = 3,
    /// 4: mirrored top to bottom
    FlipVertical = 4,
    /// 5: mirrored about the main diagonal
    Transpose = 5,
    /// 6: needs a 90° clockwise turn to display
    Rotate90Cw = 6,
    /// 7: mirrored about the anti-diagonal
    Transverse = 7,
    /// 8: needs a 270° clockwise turn to display
    Rotate270Cw = 8,
}

/// `irot` angle, in anti-clockwise quarter turns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Rotation {
    Ccw90 = 1,
    Ccw180 = 2,
    Ccw270 = 3,
}

/// `imir` axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MirrorAxis {
    /// Swap top and bottom
    TopBottom = 0,
    /// Swap left and right
    LeftRight = 1,
}

/// `irot` + `imir` pair; rotation first, then mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub rotation: Option<Rotation>,
    pub mirror: Option<MirrorAxis>,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: None,
        mirror: None,
    };

    const fn new(rotation: Option<Rotation>, mirror: Option<MirrorAxis>) -> Self {
        Self { rotation, mirror }
    }
}

impl Orientation {
    /// Parse an EXIF code; anything outside 1..=8 is `None`
    pub fn from_exif(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Normal,
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90Cw,
            7 => Self::Transverse,
            8 => Self::Rotate270Cw,
            _ => return None,
        })
    }

    pub fn exif(self) -> u8 {
        self as u8
    }

    /// Canonical `irot`/`imir` pair for this orientation
    pub fn transform(self) -> Transform {
        use MirrorAxis::*;
        use Rotation::*;
        match self {
            Self::Normal => Transform::IDENTITY,
            Self::FlipHorizontal => Transform::new(None, Some(LeftRight)),
            Self::Rotate180 => Transform::new(Some(Ccw180), None),
            Self::FlipVertical => Transform::new(None, Some(TopBottom)),
            Self::Transpose => Transform::new(Some(Ccw90), Some(TopBottom)),
            Self::Rotate90Cw => Transform::new(Some(Ccw270), None),
            Self::Transverse => Transform::new(Some(Ccw270), Some(TopBottom)),
            Self::Rotate270Cw => Transform::new(Some(Ccw90), None),
        }
    }

    /// Orientation equivalent to any `irot`/`imir` pair
    pub fn from_transform(transform: Transform) -> Self {
        use MirrorAxis::*;
        use Rotation::*;
        match (transform.rotation, transform.mirror) {
            (None, None) => Self::Normal,
            (None, Some(LeftRight)) => Self::FlipHorizontal,
            (None, Some(TopBottom)) => Self::FlipVertical,
            (Some(Ccw90), None) => Self::Rotate270Cw,
            (Some(Ccw90), Some(TopBottom)) => Self::Transpose,
            (Some(Ccw90), Some(LeftRight)) => Self::Transverse,
            (Some(Ccw180), None) => Self::Rotate180,
            (Some(Ccw180), Some(TopBottom)) => Self::FlipHorizontal,
            (Some(Ccw180), Some(LeftRight)) => Self::FlipVertical,
            (Some(Ccw270), None) => Self::Rotate90Cw,
            (Some(Ccw270), Some(TopBottom)) => Self::Transverse,
            (Some(Ccw270), Some(LeftRight)) => Self::Transpose,
        }
    }
}

/// Read the transform properties of a native image
pub(crate) fn read_transform(image: &sys::avifImage) -> Transform {
    let flags = image.transformFlags as sys::avifTransformFlags;
    let rotation = if flags & sys::AVIF_TRANSFORM_IROT as sys::avifTransformFlags != 0 {
        match image.irot.angle {
            1 => Some(Rotation::Ccw90),
            2 => Some(Rotation::Ccw180),
            3 => Some(Rotation::Ccw270),
            _ => None,
        }
    } else {
        None
    };
    let mirror = if flags & sys::AVIF_TRANSFORM_IMIR as sys::avifTransformFlags != 0 {
        Some(if image.imir.axis == 0 {
            MirrorAxis::TopBottom
        } else {
            MirrorAxis::LeftRight
        })
    } else {
        None
    };
    Transform { rotation, mirror }
}

/// Set the transform properties of a native image, clearing any absent one
pub(crate) fn write_transform(image: &mut sys::avifImage, transform: Transform) {
    let irot = sys::AVIF_TRANSFORM_IROT as sys::avifTransformFlags;
    let imir = sys::AVIF_TRANSFORM_IMIR as sys::avifTransformFlags;
    let mut flags = image.transformFlags as sys::avifTransformFlags & !(irot | imir);
    if let Some(rotation) = transform.rotation {
        flags |= irot;
        image.irot.angle = rotation as u8;
    }
    if let Some(axis) = transform.mirror {
        flags |= imir;
        image.imir.axis = axis as u8;
    }
    image.transformFlags = flags as _;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Orientation; 8] = [
        Orientation::Normal,
        Orientation::FlipHorizontal,
        Orientation::Rotate180,
        Orientation::FlipVertical,
        Orientation::Transpose,
        Orientation::Rotate90Cw,
        Orientation::Transverse,
        Orientation::Rotate270Cw,
    ];

    #[test]
    fn exif_codes_round_trip() {
        for code in 1..=8u8 {
            let orientation = Orientation::from_exif(code).unwrap();
            assert_eq!(orientation.exif(), code);
            assert_eq!(
                Orientation::from_transform(orientation.transform()),
                orientation,
                "code {code}"
            );
        }
        assert_eq!(Orientation::from_exif(0), None);
        assert_eq!(Orientation::from_exif(9), None);
    }

    #[test]
    fn canonical_table() {
        let t = |o: Orientation| {
            let t = o.transform();
            (t.rotation.map(|r| r as u8), t.mirror.map(|m| m as u8))
        };
        assert_eq!(t(Orientation::Normal), (None, None));
        assert_eq!(t(Orientation::FlipHorizontal), (None, Some(1)));
        assert_eq!(t(Orientation::Rotate180), (Some(2), None));
        assert_eq!(t(Orientation::FlipVertical), (None, Some(0)));
        assert_eq!(t(Orientation::Transpose), (Some(1), Some(0)));
        assert_eq!(t(Orientation::Rotate90Cw), (Some(3), None));
        assert_eq!(t(Orientation::Transverse), (Some(3), Some(0)));
        assert_eq!(t(Orientation::Rotate270Cw), (Some(1), None));
    }

    #[test]
    fn non_canonical_pairs() {
        let from = |r, m| Orientation::from_transform(Transform::new(r, m));
        assert_eq!(
            from(Some(Rotation::Ccw180), Some(MirrorAxis::LeftRight)),
            Orientation::FlipVertical
        );
        assert_eq!(
            from(Some(Rotation::Ccw180), Some(MirrorAxis::TopBottom)),
            Orientation::FlipHorizontal
        );
        assert_eq!(
            from(Some(Rotation::Ccw90), Some(MirrorAxis::LeftRight)),
            Orientation::Transverse
        );
        assert_eq!(
            from(Some(Rotation::Ccw270), Some(MirrorAxis::LeftRight)),
            Orientation::Transpose
        );
    }

    /// Apply a transform to pixel coordinates and compare with the EXIF
    /// meaning of each code.
    #[test]
    fn transforms_match_exif_geometry() {
        // (x, y) in a 3x2 image, mapped to the displayed position
        fn apply(t: Transform, (x, y): (i32, i32), (w, h): (i32, i32)) -> (i32, i32) {
            let (mut x, mut y, mut w, mut h) = (x, y, w, h);
            for _ in 0..t.rotation.map_or(0, |r| r as u8) {
                // one quarter turn anti-clockwise
                (x, y) = (y, w - 1 - x);
                (w, h) = (h, w);
            }
            match t.mirror {
                Some(MirrorAxis::LeftRight) => x = w - 1 - x,
                Some(MirrorAxis::TopBottom) => y = h - 1 - y,
                None => {}
            }
            (x, y)
        }
        let size = (3, 2);
        let expected = |o: Orientation, (x, y): (i32, i32)| match o {
            Orientation::Normal => (x, y),
            Orientation::FlipHorizontal => (2 - x, y),
            Orientation::Rotate180 => (2 - x, 1 - y),
            Orientation::FlipVertical => (x, 1 - y),
            Orientation::Transpose => (y, x),
            Orientation::Rotate90Cw => (1 - y, x),
            Orientation::Transverse => (1 - y, 2 - x),
            Orientation::Rotate270Cw => (y, 2 - x),
        };
        for o in ALL {
            for p in [(0, 0), (2, 0), (1, 1)] {
                assert_eq!(apply(o.transform(), p, size), expected(o, p), "{o:?} at {p:?}");
            }
        }
    }

    #[test]
    fn native_fields() {
        let mut image = sys::avifImage::default();
        for o in ALL {
            write_transform(&mut image, o.transform());
            assert_eq!(read_transform(&image), o.transform());
        }
        write_transform(&mut image, Transform::IDENTITY);
        assert_eq!(image.transformFlags as sys::avifTransformFlags, 0);
    }
}
