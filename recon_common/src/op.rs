//! Operator boilerplate for integer newtypes.
//!
//! ```rust,ignore
//! op!(binary Paise, Add, add);
//! op!(inplace Paise, AddAssign, add_assign);
//! op!(unary Paise, Neg, neg);
//! ```
#[macro_export]
macro_rules! op {
    (binary $type:ty, $trt:ident, $fn:ident) => {
        impl std::ops::$trt for $type {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self::from(std::ops::$trt::$fn(self.value(), rhs.value()))
            }
        }
    };
    (inplace $type:ty, $trt:ident, $fn:ident) => {
        impl std::ops::$trt for $type {
            fn $fn(&mut self, rhs: Self) {
                let mut v = self.value();
                std::ops::$trt::$fn(&mut v, rhs.value());
                *self = Self::from(v);
            }
        }
    };
    (unary $type:ty, $trt:ident, $fn:ident) => {
        impl std::ops::$trt for $type {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self::from(std::ops::$trt::$fn(self.value()))
            }
        }
    };
}
