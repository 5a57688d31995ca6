//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In this
/// crate `Money` and `Rate` are the canonical examples: two amounts of `50.00`
/// are the same amount, whichever order they came from.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
