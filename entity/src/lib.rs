pub mod prelude;

pub mod orders;
pub mod products;
pub mod sales;

/// A type alias that represents any Entity's internal id field data type.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = i32;
