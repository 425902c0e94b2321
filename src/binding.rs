//! Field binding tables
//!
//! A configuration type describes its bindable fields through a static table of
//! [`FieldDescriptor`]s instead of runtime reflection. The table is normally
//! generated by `#[derive(DeriveConfigType)]`, or written by hand with
//! [`config_fields!`](crate::config_fields).

use serde_json::Value;
use std::fmt;

/// Closed set of value shapes a field can hold.
///
/// The serializer dispatches on this tag rather than on the runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Integer,
    Float,
    Text,
    /// Dates and timestamps; encoding is left to the field type's serde impl
    DateTime,
    List,
    /// Nested plain-data objects, maps and enums
    Object,
    /// Nullable wrapper around another kind
    Optional(&'static ValueKind),
}

impl ValueKind {
    /// Human readable name used in error messages
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::DateTime => "datetime",
            ValueKind::List => "list",
            ValueKind::Object => "object",
            ValueKind::Optional(_) => "optional",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Optional(inner) => write!(f, "optional {inner}"),
            other => f.write_str(other.name()),
        }
    }
}

/// One bindable field: its name, value shape, and accessors.
pub struct FieldDescriptor<T: 'static> {
    /// Field name used for the entry key (before normalization)
    pub name: &'static str,
    /// Shape of the stored value
    pub kind: ValueKind,
    /// Copy the field out of an instance
    pub get: fn(&T) -> serde_json::Result<Value>,
    /// Write a decoded value into an instance
    pub set: fn(&mut T, Value) -> serde_json::Result<()>,
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A type whose fields can be bound to configuration entries.
///
/// # Example
///
/// ```rust
/// use confstore::{config_fields, ConfigType, FieldDescriptor, ValueKind};
///
/// #[derive(Default)]
/// struct CheckoutConfig {
///     login_required: bool,
///     max_items: u32,
/// }
///
/// impl ConfigType for CheckoutConfig {
///     const TYPE_NAME: &'static str = "CheckoutConfig";
///
///     fn fields() -> &'static [FieldDescriptor<Self>] {
///         config_fields!(CheckoutConfig {
///             "LoginRequired" => login_required: ValueKind::Bool,
///             "MaxItems" => max_items: ValueKind::Integer,
///         })
///     }
/// }
///
/// assert_eq!(CheckoutConfig::fields().len(), 2);
/// ```
pub trait ConfigType: Sized + 'static {
    /// Type name used as the first key segment
    const TYPE_NAME: &'static str;

    /// Every bindable field, in declaration order
    fn fields() -> &'static [FieldDescriptor<Self>];
}

/// Build a static field table for a concrete type.
///
/// Each line maps a key field name to a struct field and its [`ValueKind`].
/// The type must be named explicitly (not `Self`) because the table is a
/// `const` item.
#[macro_export]
macro_rules! config_fields {
    ($ty:ty { $($name:literal => $field:ident : $kind:expr),* $(,)? }) => {{
        const FIELDS: &[$crate::FieldDescriptor<$ty>] = &[
            $(
                $crate::FieldDescriptor {
                    name: $name,
                    kind: $kind,
                    get: |config: &$ty| {
                        #[allow(unused_imports)]
                        use $crate::__private::{AnyField as _, FloatField as _};
                        (&&$crate::__private::Field(&config.$field)).ensure_finite()?;
                        $crate::__private::serde_json::to_value(&config.$field)
                    },
                    set: |config: &mut $ty, value: $crate::__private::serde_json::Value| {
                        config.$field = $crate::__private::serde_json::from_value(value)?;
                        Ok(())
                    },
                }
            ),*
        ];
        FIELDS
    }};
}

// =============================================================================
// Float accessors
// =============================================================================

/// Float-bearing field types. JSON has no encoding for NaN or infinity, so
/// `serde_json` turns them into `null`, which would load back as a default.
#[doc(hidden)]
pub trait FiniteFloat {
    fn is_non_finite(&self) -> bool;
}

impl FiniteFloat for f32 {
    fn is_non_finite(&self) -> bool {
        !self.is_finite()
    }
}

impl FiniteFloat for f64 {
    fn is_non_finite(&self) -> bool {
        !self.is_finite()
    }
}

impl<T: FiniteFloat> FiniteFloat for Option<T> {
    fn is_non_finite(&self) -> bool {
        self.as_ref().is_some_and(FiniteFloat::is_non_finite)
    }
}

impl<T: FiniteFloat + ?Sized> FiniteFloat for Box<T> {
    fn is_non_finite(&self) -> bool {
        (**self).is_non_finite()
    }
}

/// Field reference used by generated accessors.
///
/// `(&&Field(&value)).ensure_finite()` resolves to [`FloatField`] when the
/// field type is a [`FiniteFloat`] and to the no-op [`AnyField`] otherwise.
#[doc(hidden)]
pub struct Field<'a, T: ?Sized>(pub &'a T);

#[doc(hidden)]
pub trait FloatField {
    fn ensure_finite(&self) -> serde_json::Result<()>;
}

impl<T: FiniteFloat + ?Sized> FloatField for &Field<'_, T> {
    fn ensure_finite(&self) -> serde_json::Result<()> {
        if self.0.is_non_finite() {
            return Err(<serde_json::Error as serde::ser::Error>::custom(
                "non-finite float cannot be stored",
            ));
        }
        Ok(())
    }
}

#[doc(hidden)]
pub trait AnyField {
    fn ensure_finite(&self) -> serde_json::Result<()>;
}

impl<T: ?Sized> AnyField for Field<'_, T> {
    fn ensure_finite(&self) -> serde_json::Result<()> {
        Ok(())
    }
}
