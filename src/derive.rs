//! Schemas of Rust types
//!
//! [`HasSchema`] is the entry point for turning a static type into a schema.
//! Primitives and standard containers are covered here; user types implement
//! it by composing the builders on [`Schema`], binding a [`crate::Name`] where
//! they are recursive.

use std::cell::RefCell;

use crate::schema::Schema;

/// A type with a known schema
pub trait HasSchema {
    fn schema() -> Schema;
}

/// Schema of `T`
pub fn derive<T: HasSchema + ?Sized>() -> Schema {
    T::schema()
}

macro_rules! atom_schema {
    ($builder:ident: $($ty:ty),+) => {
        $(
            impl HasSchema for $ty {
                fn schema() -> Schema {
                    Schema::$builder()
                }
            }
        )+
    };
}

atom_schema!(int: i8, i16, u8, u16, u32);
atom_schema!(int32: i32);
atom_schema!(int64: i64);
atom_schema!(native_int: isize);
atom_schema!(float: f32, f64);
atom_schema!(char: char);
atom_schema!(string: String, str);
atom_schema!(bool: bool);
atom_schema!(unit: ());

impl<T: HasSchema> HasSchema for Option<T> {
    fn schema() -> Schema {
        Schema::option(T::schema())
    }
}

impl<T: HasSchema> HasSchema for Vec<T> {
    fn schema() -> Schema {
        Schema::list(T::schema())
    }
}

impl<T: HasSchema> HasSchema for Box<[T]> {
    fn schema() -> Schema {
        Schema::array(T::schema())
    }
}

impl<T: HasSchema> HasSchema for RefCell<T> {
    fn schema() -> Schema {
        Schema::reference(T::schema())
    }
}

/// Boxing is a layout detail, not part of the shape
impl<T: HasSchema> HasSchema for Box<T> {
    fn schema() -> Schema {
        T::schema()
    }
}

macro_rules! tuple_schema {
    ($($name:ident),+) => {
        impl<$($name: HasSchema),+> HasSchema for ($($name,)+) {
            fn schema() -> Schema {
                Schema::tuple(vec![$($name::schema()),+])
            }
        }
    };
}

tuple_schema!(A, B);
tuple_schema!(A, B, C);
tuple_schema!(A, B, C, D);
tuple_schema!(A, B, C, D, E);
