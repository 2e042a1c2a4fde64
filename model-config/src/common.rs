pub use anyhow::Context as _;
pub use bbox::HW;
pub use getset::{CopyGetters, Getters};
pub use itertools::Itertools as _;
pub use noisy_float::prelude::*;
pub use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
pub use std::{
    borrow::Borrow,
    collections::HashSet,
    convert::TryFrom,
    fmt::{self, Display, Formatter},
    path::Path,
};
pub use strum::{AsRefStr, EnumString};
