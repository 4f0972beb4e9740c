//! Cell value trait

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Numeric types that can be stored in a raster cell.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// No-data value used when a raster declares none and one is needed,
    /// e.g. for cells outside a cutline.
    fn default_nodata() -> Self;

    /// Check if this value represents no-data.
    ///
    /// Floating point NaN always counts as no-data.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_int_element {
    ($($t:ty => $nodata:expr),* $(,)?) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    $nodata
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata == Some(*self)
                }
            }
        )*
    };
}

macro_rules! impl_float_element {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    self.is_nan() || nodata.is_some_and(|nd| *self == nd)
                }
            }
        )*
    };
}

impl_int_element!(u8 => u8::MAX, u16 => u16::MAX, i16 => i16::MIN, i32 => i32::MIN);
impl_float_element!(f32, f64);
