use crate::{common::*, error::ConfigError};

pub use channel_order::*;
pub use grid_size::*;
pub use image_size::*;
pub use scale_name::*;

mod channel_order {
    use super::*;

    /// Memory layout of backbone feature maps and of the input shape.
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumString, Serialize, Deserialize,
    )]
    #[serde(rename_all = "snake_case")]
    #[strum(serialize_all = "snake_case")]
    pub enum ChannelOrder {
        /// `[height, width, channels]`
        ChannelsLast,
        /// `[channels, height, width]`
        ChannelsFirst,
    }

    impl ChannelOrder {
        /// Split a 3-D shape into `(height, width, channels)`.
        pub fn hwc(&self, shape: [usize; 3]) -> [usize; 3] {
            match *self {
                Self::ChannelsLast => shape,
                Self::ChannelsFirst => {
                    let [c, h, w] = shape;
                    [h, w, c]
                }
            }
        }
    }

    impl Default for ChannelOrder {
        fn default() -> Self {
            Self::ChannelsLast
        }
    }
}

mod image_size {
    use super::*;

    /// The fixed network input resolution in pixels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters)]
    #[getset(get_copy = "pub")]
    pub struct ImageSize {
        w: usize,
        h: usize,
    }

    impl ImageSize {
        pub fn new(w: usize, h: usize) -> Result<Self, ConfigError> {
            if w == 0 || h == 0 {
                return Err(ConfigError::InvalidInputShape { shape: [h, w, 1] });
            }
            Ok(Self { w, h })
        }

        pub fn from_input_shape(shape: [usize; 3], order: ChannelOrder) -> Result<Self, ConfigError> {
            let [h, w, c] = order.hwc(shape);
            if h == 0 || w == 0 || c == 0 {
                return Err(ConfigError::InvalidInputShape { shape });
            }
            Ok(Self { w, h })
        }
    }

    impl Display for ImageSize {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "{}x{}", self.w, self.h)
        }
    }
}

mod grid_size {
    use super::*;

    /// Spatial size of a feature map, in grid cells.
    #[derive(
        Debug, Clone, Copy, PartialEq, Eq, Hash, CopyGetters, Serialize, Deserialize,
    )]
    #[serde(try_from = "[usize; 2]", into = "[usize; 2]")]
    #[getset(get_copy = "pub")]
    pub struct GridSize {
        h: usize,
        w: usize,
    }

    impl GridSize {
        pub fn new(h: usize, w: usize) -> Result<Self, ConfigError> {
            if h == 0 || w == 0 {
                return Err(ConfigError::NonPositiveGrid { h, w });
            }
            Ok(Self { h, w })
        }

        /// The grid of a globally pooled feature map.
        pub const fn single_cell() -> Self {
            Self { h: 1, w: 1 }
        }

        pub fn num_cells(&self) -> usize {
            self.h * self.w
        }
    }

    impl TryFrom<[usize; 2]> for GridSize {
        type Error = ConfigError;

        fn try_from([h, w]: [usize; 2]) -> Result<Self, Self::Error> {
            Self::new(h, w)
        }
    }

    impl From<GridSize> for [usize; 2] {
        fn from(from: GridSize) -> Self {
            [from.h, from.w]
        }
    }

    impl Display for GridSize {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "{}x{}", self.h, self.w)
        }
    }
}

mod scale_name {
    use super::*;

    /// Name of a detection scale, used to point at the scale in error messages.
    #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct ScaleName(String);

    impl ScaleName {
        pub fn new(name: impl Into<String>) -> Result<Self, ConfigError> {
            let name = name.into();
            if name.is_empty() {
                return Err(ConfigError::EmptyScaleName);
            }
            Ok(Self(name))
        }

        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl Serialize for ScaleName {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.0.serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for ScaleName {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let text = String::deserialize(deserializer)?;
            Self::new(text).map_err(|err| D::Error::custom(format!("invalid name: {}", err)))
        }
    }

    impl TryFrom<&str> for ScaleName {
        type Error = ConfigError;

        fn try_from(name: &str) -> Result<Self, Self::Error> {
            Self::new(name)
        }
    }

    impl Borrow<str> for ScaleName {
        fn borrow(&self) -> &str {
            self.0.as_ref()
        }
    }

    impl AsRef<str> for ScaleName {
        fn as_ref(&self) -> &str {
            self.0.as_ref()
        }
    }

    impl Display for ScaleName {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            self.0.fmt(f)
        }
    }
}
