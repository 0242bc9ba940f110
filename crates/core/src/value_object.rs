//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In this
/// workspace they are mostly snapshots handed from one aggregate to another,
/// e.g. a `PaymentTypeRef { id, kind }` carried inside a purchase command, or
/// a party's pair of default payment types.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct PaymentTypeRef {
///     id: PaymentTypeId,
///     kind: PaymentKind,
/// }
///
/// impl ValueObject for PaymentTypeRef {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
