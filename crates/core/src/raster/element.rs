//! Cell value types

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Types that can be stored in a raster cell.
///
/// Elevation, accumulation and score grids are `f64`; direction codes are
/// `u8`; risk classes are `i8`; basin labels are `i32`.
pub trait RasterElement:
    Copy + Debug + PartialOrd + NumCast + Zero + Send + Sync + 'static
{
    /// No-data value used when none has been declared
    fn default_nodata() -> Self;

    /// Whether this value is no-data under the given declared sentinel.
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Lossy conversion to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! integer_element {
    ($($t:ty => $nodata:expr),* $(,)?) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    $nodata
                }

                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    nodata.is_some_and(|nd| *self == nd)
                }

                fn is_float() -> bool {
                    false
                }
            }
        )*
    };
}

macro_rules! float_element {
    ($($t:ty),*) => {
        $(
            impl RasterElement for $t {
                fn default_nodata() -> Self {
                    <$t>::NAN
                }

                /// Non-finite samples are always no-data, regardless of the
                /// declared sentinel.
                fn is_nodata(&self, nodata: Option<Self>) -> bool {
                    if !self.is_finite() {
                        return true;
                    }
                    match nodata {
                        Some(nd) if nd.is_finite() => (self - nd).abs() <= nd.abs().max(1.0) * <$t>::EPSILON * 4.0,
                        _ => false,
                    }
                }

                fn is_float() -> bool {
                    true
                }
            }
        )*
    };
}

integer_element!(
    u8 => u8::MAX,
    i8 => i8::MIN,
    i16 => i16::MIN,
    i32 => i32::MIN,
    u32 => u32::MAX,
);
float_element!(f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_nodata_matches_sentinel_and_non_finite() {
        assert!((-9999.0f64).is_nodata(Some(-9999.0)));
        assert!(f64::NAN.is_nodata(None));
        assert!(f64::INFINITY.is_nodata(Some(-9999.0)));
        assert!(!(-9998.5f64).is_nodata(Some(-9999.0)));
        assert!(!0.0f64.is_nodata(None));
    }

    #[test]
    fn integer_nodata_requires_declaration() {
        assert!(!255u8.is_nodata(None));
        assert!(255u8.is_nodata(Some(255)));
        assert_eq!(i8::default_nodata(), i8::MIN);
    }
}
