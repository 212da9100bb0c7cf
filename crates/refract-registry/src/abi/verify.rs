//! Index consistency check.

use refract_core::VerifyError;

use crate::Registry;

impl Registry {
    /// Check that every name index of every published row points inside its
    /// member collection.
    ///
    /// Returns the first violation found, scanning rows in slot order and
    /// within a row fields, then properties, then method overloads.
    pub fn verify(&self) -> Result<(), VerifyError> {
        let state = self.read();
        for (_, row) in state.types() {
            let type_name = || row.name.as_str().to_string();

            if let Some(&index) = row.field_index.values().find(|&&i| i as usize >= row.fields.len()) {
                return Err(VerifyError::FieldIndexOverflow {
                    type_name: type_name(),
                    index: index as usize,
                    len: row.fields.len(),
                });
            }
            if let Some(&index) = row
                .property_index
                .values()
                .find(|&&i| i as usize >= row.properties.len())
            {
                return Err(VerifyError::PropertyIndexOverflow {
                    type_name: type_name(),
                    index: index as usize,
                    len: row.properties.len(),
                });
            }
            if let Some(&index) = row
                .method_index
                .values()
                .flatten()
                .find(|&&i| i as usize >= row.methods.len())
            {
                return Err(VerifyError::MethodOverloadIndexOverflow {
                    type_name: type_name(),
                    index: index as usize,
                    len: row.methods.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use refract_core::{Typed, VerifyError};

    use crate::{Reflect, Registry, TypeBuilder};

    #[derive(Clone, Debug, Default)]
    struct Valve {
        open: bool,
    }

    impl Typed for Valve {
        fn type_name() -> &'static str {
            "Valve"
        }
    }

    impl Reflect for Valve {
        fn describe(t: &mut TypeBuilder<'_, Self>) {
            t.field("open", |v| &v.open, |v| &mut v.open);
            t.property("closed", |v: &Valve| !v.open);
            t.method("toggle", |v: &Valve| !v.open);
        }
    }

    #[test]
    fn consistent_registry_verifies() {
        let registry = Registry::new();
        registry.ensure_registered::<Valve>();
        assert_eq!(registry.verify(), Ok(()));
    }

    #[test]
    fn out_of_range_entries_are_reported() {
        let registry = Registry::new();
        let valve = registry.ensure_registered::<Valve>();

        registry.write().get_mut(valve).unwrap().fields.clear();
        let err = registry.verify().unwrap_err();
        assert_eq!(err.as_str(), "field index overflow");
        assert!(matches!(err, VerifyError::FieldIndexOverflow { index: 0, len: 0, .. }));

        registry.write().get_mut(valve).unwrap().rebuild_indexes();
        registry.write().get_mut(valve).unwrap().properties.clear();
        assert!(matches!(
            registry.verify(),
            Err(VerifyError::PropertyIndexOverflow { .. })
        ));

        registry.write().get_mut(valve).unwrap().rebuild_indexes();
        registry.write().get_mut(valve).unwrap().methods.clear();
        let err = registry.verify().unwrap_err();
        assert_eq!(
            err,
            VerifyError::MethodOverloadIndexOverflow {
                type_name: "Valve".to_string(),
                index: 0,
                len: 0,
            }
        );
    }
}
