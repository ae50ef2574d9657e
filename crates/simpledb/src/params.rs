//! Conversion of argument lists into positional parameters.

use crate::value::Value;

/// Anything that can be turned into an ordered list of statement parameters.
///
/// Implemented for `()`, tuples of up to 12 elements, arrays, `Vec`s and
/// slices of [`Value`]. Mixed-type lists can also be written with
/// [`params!`](crate::params!).
///
/// ```ignore
/// sql.append("WHERE title = ? AND is_blind = ?", ("title1", false));
/// sql.append_in("AND id IN (?)", [1, 2, 3])?;
/// ```
pub trait IntoParams {
    fn into_params(self) -> Vec<Value>;
}

impl IntoParams for () {
    fn into_params(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<T: Into<Value>> IntoParams for Vec<T> {
    fn into_params(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>, const N: usize> IntoParams for [T; N] {
    fn into_params(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl IntoParams for &[Value] {
    fn into_params(self) -> Vec<Value> {
        self.to_vec()
    }
}

macro_rules! impl_into_params_tuple {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> IntoParams for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_params(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

impl_into_params_tuple!(A);
impl_into_params_tuple!(A, B);
impl_into_params_tuple!(A, B, C);
impl_into_params_tuple!(A, B, C, D);
impl_into_params_tuple!(A, B, C, D, E);
impl_into_params_tuple!(A, B, C, D, E, F);
impl_into_params_tuple!(A, B, C, D, E, F, G);
impl_into_params_tuple!(A, B, C, D, E, F, G, H);
impl_into_params_tuple!(A, B, C, D, E, F, G, H, I);
impl_into_params_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_into_params_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_into_params_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Build a `Vec<Value>` from a heterogeneous list of expressions.
///
/// ```ignore
/// let params = simpledb::params!["title1", "body1", false];
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_has_no_params() {
        assert!(().into_params().is_empty());
    }

    #[test]
    fn tuples_keep_order_and_mix_types() {
        assert_eq!(
            ("a", 1, false).into_params(),
            vec![Value::Text("a".into()), Value::Int(1), Value::Bool(false)]
        );
    }

    #[test]
    fn arrays_and_vecs_convert_each_element() {
        assert_eq!(
            [1, 2, 3].into_params(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
        assert_eq!(vec!["x"].into_params(), vec![Value::Text("x".into())]);
    }

    #[test]
    fn params_macro_builds_values() {
        let params = crate::params!["t", 2_i64, None::<String>];
        assert_eq!(
            params,
            vec![Value::Text("t".into()), Value::Int(2), Value::Null]
        );
        assert!(crate::params![].is_empty());
    }
}
