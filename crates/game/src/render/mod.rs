mod interpolator;

pub use interpolator::{RenderInterpolator, RenderTransform};
