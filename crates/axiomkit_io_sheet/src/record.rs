//! Record exporter capability and attribute resolution.

use std::collections::{BTreeMap, HashMap};

use crate::error::{SheetExportError, SheetExportResult};
use crate::spec::{EnumRecordValue, SpecExportColumns};
use crate::util::derive_unique_properties;

////////////////////////////////////////////////////////////////////////////////
// #region RecordAttributes

/// Ordered attribute name to value mapping of one record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRecordAttributes {
    l_names: Vec<String>,
    dict_values: BTreeMap<String, EnumRecordValue>,
}

impl SpecRecordAttributes {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an attribute. New names are appended.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<EnumRecordValue>) {
        let c_name = name.into();
        if !self.dict_values.contains_key(&c_name) {
            self.l_names.push(c_name.clone());
        }
        self.dict_values.insert(c_name, value.into());
    }

    /// Builder form of [`Self::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<EnumRecordValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Attribute names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.l_names
    }

    /// Value of `name`, `None` when the record has no such attribute.
    pub fn get(&self, name: &str) -> Option<&EnumRecordValue> {
        self.dict_values.get(name)
    }

    /// Whether the record has `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.dict_values.contains_key(name)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.l_names.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.l_names.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for SpecRecordAttributes
where
    K: Into<String>,
    V: Into<EnumRecordValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attributes = Self::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ExportRecord

/// Capability of exposing a record as named attributes.
///
/// Implemented by maps and by plain structs through [`crate::impl_export_record`].
pub trait ExportRecord {
    /// Attributes of this record in a stable order.
    fn export_attributes(&self) -> SpecRecordAttributes;
}

impl ExportRecord for SpecRecordAttributes {
    fn export_attributes(&self) -> SpecRecordAttributes {
        self.clone()
    }
}

impl<V> ExportRecord for BTreeMap<String, V>
where
    V: Clone + Into<EnumRecordValue>,
{
    fn export_attributes(&self) -> SpecRecordAttributes {
        self.iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl<V, S> ExportRecord for HashMap<String, V, S>
where
    V: Clone + Into<EnumRecordValue>,
{
    fn export_attributes(&self) -> SpecRecordAttributes {
        let mut l_entries: Vec<(&String, &V)> = self.iter().collect();
        l_entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        l_entries
            .into_iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl<V> ExportRecord for Vec<(String, V)>
where
    V: Clone + Into<EnumRecordValue>,
{
    fn export_attributes(&self) -> SpecRecordAttributes {
        self.iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl<T: ExportRecord + ?Sized> ExportRecord for &T {
    fn export_attributes(&self) -> SpecRecordAttributes {
        (**self).export_attributes()
    }
}

/// Implement [`ExportRecord`] for a struct by listing its fields.
///
/// Attributes are named after the fields and keep the listed order. Every
/// field type must be `Clone + Into<EnumRecordValue>`.
///
/// ```
/// use axiomkit_io_sheet::impl_export_record;
///
/// struct Person {
///     name: String,
///     age: Option<u32>,
/// }
///
/// impl_export_record!(Person { name, age });
/// ```
#[macro_export]
macro_rules! impl_export_record {
    ($ty:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::record::ExportRecord for $ty {
            fn export_attributes(&self) -> $crate::record::SpecRecordAttributes {
                let mut attributes = $crate::record::SpecRecordAttributes::new();
                $(
                    attributes.insert(
                        stringify!($field),
                        $crate::spec::EnumRecordValue::from(self.$field.clone()),
                    );
                )+
                attributes
            }
        }
    };
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region AttributeResolution

/// Resolve the exported attribute names in place.
///
/// Empty `properties` are derived from `first_record`; exclusions are removed
/// afterwards. Fails when nothing is left to export.
pub fn resolve_properties(
    columns: &mut SpecExportColumns,
    first_record: Option<&SpecRecordAttributes>,
) -> SheetExportResult<()> {
    if columns.properties.is_empty() {
        let Some(record) = first_record else {
            return Err(SheetExportError::config(
                "no properties configured and no record to derive them from.",
            ));
        };
        columns.properties = derive_unique_properties(record.names().iter().cloned());
    }

    if !columns.exclude_properties.is_empty() {
        columns
            .properties
            .retain(|c_property| !columns.exclude_properties.contains(c_property));
    }

    if columns.properties.is_empty() {
        return Err(SheetExportError::config("properties resolved to an empty set."));
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    struct SpecPerson {
        name: String,
        age: Option<u32>,
        active: bool,
    }

    crate::impl_export_record!(SpecPerson { name, age, active });

    #[derive(Clone)]
    struct SpecStock {
        sku: String,
        n_units: usize,
        n_checksum: u64,
    }

    crate::impl_export_record!(SpecStock { sku, n_units, n_checksum });

    #[test]
    fn test_struct_record_accepts_wide_integer_fields() {
        let attributes = SpecStock {
            sku: "s-1".to_string(),
            n_units: 12,
            n_checksum: u64::MAX,
        }
        .export_attributes();

        assert_eq!(attributes.names(), ["sku", "n_units", "n_checksum"]);
        assert_eq!(attributes.get("n_units"), Some(&EnumRecordValue::Integer(12)));
        assert_eq!(
            attributes.get("n_checksum"),
            Some(&EnumRecordValue::Float(u64::MAX as f64))
        );
    }

    #[test]
    fn test_struct_record_keeps_field_order() {
        let person = SpecPerson {
            name: "Ada".to_string(),
            age: None,
            active: true,
        };
        let attributes = person.export_attributes();

        assert_eq!(attributes.names(), ["name", "age", "active"]);
        assert_eq!(attributes.get("age"), Some(&EnumRecordValue::Null));
        assert_eq!(attributes.get("active"), Some(&EnumRecordValue::Boolean(true)));
        assert_eq!(attributes.get("missing"), None);
    }

    #[test]
    fn test_hash_map_record_is_sorted() {
        let mut dict_record = HashMap::new();
        dict_record.insert("b".to_string(), 2i64);
        dict_record.insert("a".to_string(), 1i64);
        dict_record.insert("c".to_string(), 3i64);

        assert_eq!(dict_record.export_attributes().names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_insert_replaces_without_reordering() {
        let attributes = SpecRecordAttributes::new()
            .with("x", 1i32)
            .with("y", 2i32)
            .with("x", 3i32);

        assert_eq!(attributes.names(), ["x", "y"]);
        assert_eq!(attributes.get("x"), Some(&EnumRecordValue::Integer(3)));
    }

    #[test]
    fn test_resolve_properties_from_first_record_minus_exclusions() {
        let record = SpecRecordAttributes::new()
            .with("id", 1i32)
            .with("secret", "s")
            .with("name", "n");
        let mut columns = SpecExportColumns {
            exclude_properties: BTreeSet::from(["secret".to_string()]),
            ..Default::default()
        };

        resolve_properties(&mut columns, Some(&record)).unwrap();
        assert_eq!(columns.properties, ["id", "name"]);
    }

    #[test]
    fn test_resolve_properties_keeps_explicit_list() {
        let record = SpecRecordAttributes::new().with("id", 1i32);
        let mut columns = SpecExportColumns {
            properties: vec!["name".to_string(), "id".to_string()],
            ..Default::default()
        };

        resolve_properties(&mut columns, Some(&record)).unwrap();
        assert_eq!(columns.properties, ["name", "id"]);
    }

    #[test]
    fn test_resolve_properties_fails_when_everything_is_excluded() {
        let record = SpecRecordAttributes::new().with("id", 1i32);
        let mut columns = SpecExportColumns {
            exclude_properties: BTreeSet::from(["id".to_string()]),
            ..Default::default()
        };

        let err = resolve_properties(&mut columns, Some(&record)).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_resolve_properties_fails_without_record() {
        let mut columns = SpecExportColumns::default();
        assert!(resolve_properties(&mut columns, None).unwrap_err().is_config());
    }
}
