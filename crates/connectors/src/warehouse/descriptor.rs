use crate::{
    error::StorageError,
    warehouse::{
        mapper::{convert_type, restore_type, sanitize_identifier},
        native::{Mode, NativeField, NativeSchema, NativeType},
    },
};
use model::schema::descriptor::{Constraints, Descriptor, Field};
use std::collections::{BTreeSet, HashMap};

/// Positions of fields stored as serialized text because their type has no
/// native equivalent.
pub type FallbackSet = BTreeSet<usize>;

/// Converts a descriptor to a native schema, field for field and in order.
pub fn convert_descriptor(
    descriptor: &Descriptor,
) -> Result<(NativeSchema, FallbackSet), StorageError> {
    let mut fields = Vec::with_capacity(descriptor.len());
    let mut fallbacks = FallbackSet::new();
    let mut columns: HashMap<String, &str> = HashMap::with_capacity(descriptor.len());

    for (index, field) in descriptor.fields.iter().enumerate() {
        let field_type = match convert_type(field.field_type) {
            Some(native) => native,
            None => {
                fallbacks.insert(index);
                NativeType::String
            }
        };

        let name = sanitize_identifier(&field.name);
        if let Some(first) = columns.insert(name.clone(), &field.name) {
            return Err(StorageError::DuplicateColumn {
                first: first.to_string(),
                second: field.name.clone(),
                column: name,
            });
        }

        let mode = if field.is_required() {
            Mode::Required
        } else {
            Mode::Nullable
        };

        fields.push(NativeField {
            name,
            field_type,
            mode,
        });
    }

    Ok((NativeSchema { fields }, fallbacks))
}

/// The fallback positions [`convert_descriptor`] would report, without
/// building the schema.
pub fn fallback_positions(descriptor: &Descriptor) -> FallbackSet {
    descriptor
        .fields
        .iter()
        .enumerate()
        .filter(|(_, field)| convert_type(field.field_type).is_none())
        .map(|(index, _)| index)
        .collect()
}

/// Rebuilds a descriptor from a native schema. Fallback columns come back as
/// `string`; `constraints` is only present for required columns.
pub fn restore_descriptor(schema: &NativeSchema) -> Result<Descriptor, StorageError> {
    let fields = schema
        .fields
        .iter()
        .map(|native| {
            if native.mode == Mode::Repeated {
                return Err(StorageError::UnsupportedType(format!(
                    "REPEATED {}",
                    native.field_type
                )));
            }

            let mut field = Field::new(native.name.clone(), restore_type(&native.field_type)?);
            if native.mode != Mode::Nullable {
                field.constraints = Some(Constraints { required: true });
            }
            Ok(field)
        })
        .collect::<Result<Vec<_>, StorageError>>()?;

    Ok(Descriptor::new(fields))
}
