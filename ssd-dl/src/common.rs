pub use crate::error::{Error, Result, MERGED_SCOPE, MODEL_SCOPE};
pub use bbox::{prelude::*, CyCxHW, HW};
pub use derivative::Derivative;
pub use getset::{CopyGetters, Getters};
pub use itertools::{iproduct, izip, Itertools as _};
pub use log::{debug, info, warn};
pub use model_config::{
    ChannelOrder, ConfigError, GridSize, ImageSize, ScaleName, ScaleSpec, SsdConfig,
};
pub use ndarray::{
    concatenate, s, Array1, Array2, Array3, Array4, ArrayD, ArrayView1, ArrayView2, ArrayView3,
    ArrayViewMut1, ArrayViewMut2, Axis, Ix3,
};
pub use noisy_float::prelude::*;
pub use rayon::prelude::*;
pub use std::{
    borrow::Cow,
    fmt::Debug,
    sync::Arc,
};
