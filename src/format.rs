// yolo-detect 🚀 AGPL-3.0 License

//! Box encodings produced by detection heads.

use std::fmt;
use std::str::FromStr;

use crate::geometry::Rect;

/// Layout of the four box parameters (rows 0..4) of the raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoxFormat {
    /// Corners: `(left, top, right, bottom)`.
    #[default]
    Xyxy,
    /// Center and size: `(cx, cy, w, h)`.
    CenterSize,
}

impl BoxFormat {
    /// Returns the canonical string used on the command line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xyxy => "xyxy",
            Self::CenterSize => "xywh",
        }
    }

    /// Build a rectangle from the four raw box parameters.
    #[must_use]
    pub fn to_rect(self, p0: f32, p1: f32, p2: f32, p3: f32) -> Rect {
        match self {
            Self::Xyxy => Rect::new(p0, p1, p2, p3),
            Self::CenterSize => Rect::from_center(p0, p1, p2, p3),
        }
    }
}

impl fmt::Display for BoxFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BoxFormat {
    type Err = BoxFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xyxy" | "corners" => Ok(Self::Xyxy),
            "xywh" | "cxcywh" | "center" | "center-size" | "centersize" => Ok(Self::CenterSize),
            _ => Err(BoxFormatParseError(s.to_string())),
        }
    }
}

/// Error returned when parsing an invalid box format string.
#[derive(Debug, Clone)]
pub struct BoxFormatParseError(String);

impl fmt::Display for BoxFormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid box format '{}', expected one of: xyxy, xywh",
            self.0
        )
    }
}

impl std::error::Error for BoxFormatParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_format_from_str() {
        assert_eq!("xyxy".parse::<BoxFormat>().unwrap(), BoxFormat::Xyxy);
        assert_eq!("XYWH".parse::<BoxFormat>().unwrap(), BoxFormat::CenterSize);
        assert_eq!("center-size".parse::<BoxFormat>().unwrap(), BoxFormat::CenterSize);
        assert!("polygon".parse::<BoxFormat>().is_err());
    }

    #[test]
    fn test_box_format_display_round_trips() {
        for format in [BoxFormat::Xyxy, BoxFormat::CenterSize] {
            assert_eq!(format.to_string().parse::<BoxFormat>().unwrap(), format);
        }
    }

    #[test]
    fn test_to_rect() {
        assert_eq!(
            BoxFormat::Xyxy.to_rect(1.0, 2.0, 3.0, 4.0),
            Rect::new(1.0, 2.0, 3.0, 4.0)
        );
        assert_eq!(
            BoxFormat::CenterSize.to_rect(100.0, 100.0, 50.0, 20.0),
            Rect::new(75.0, 90.0, 125.0, 110.0)
        );
    }
}
