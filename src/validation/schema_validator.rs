use serde_json::{Map, Value};
use std::sync::Arc;

use crate::atomic::operations::{Create, Update};
use crate::model::{Linkage, Model, QueryParams, RequestContext, ResourceObject, ResourceType};
use crate::schema::{ResourceSchema, SchemaContainer};
use crate::validation::{
    ValidationError, ValidationErrorKind, Validator, ValidatorContainer, ValidatorFactory,
};

const QUERY_PARAMETERS: [&str; 5] = ["include", "fields", "filter", "sort", "page"];

/// Validation result computed eagerly against a resource schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    errors: Vec<ValidationError>,
    validated: Map<String, Value>,
}

impl Validator for SchemaValidator {
    fn fails(&self) -> bool {
        !self.errors.is_empty()
    }

    fn errors(&self) -> Vec<ValidationError> {
        self.errors.clone()
    }

    fn validated(&self) -> Map<String, Value> {
        self.validated.clone()
    }
}

impl SchemaValidator {
    /// Validate a resource object. `partial` skips the required check, for
    /// updates that only send the fields they change.
    pub fn resource(schema: &ResourceSchema, resource: &ResourceObject, partial: bool) -> Self {
        let mut errors = Vec::new();

        // Check for undefined attributes and type mismatches
        for (name, value) in &resource.attributes {
            match schema.attribute(name) {
                None => errors.push(
                    ValidationError::new(
                        name,
                        ValidationErrorKind::UndefinedField,
                        format!(
                            "Attribute '{}' is not defined for '{}'",
                            name, schema.resource_type
                        ),
                    )
                    .actual(name.clone()),
                ),
                Some(def) if !def.data_type.accepts(value) => errors.push(
                    ValidationError::new(
                        name,
                        ValidationErrorKind::TypeMismatch,
                        format!(
                            "Type mismatch for attribute '{}': expected {:?}",
                            name, def.data_type
                        ),
                    )
                    .expected(format!("{:?}", def.data_type))
                    .actual(value.to_string()),
                ),
                Some(_) => {}
            }
        }

        if !partial {
            for def in &schema.attributes {
                let missing = resource.attributes.get(&def.name).map_or(true, Value::is_null);
                if def.required.unwrap_or(false) && missing {
                    errors.push(
                        ValidationError::new(
                            &def.name,
                            ValidationErrorKind::MissingRequired,
                            format!("Required attribute '{}' is missing", def.name),
                        )
                        .expected(format!("{:?}", def.data_type)),
                    );
                }
            }
        }

        for (name, relationship) in &resource.relationships {
            errors.extend(check_linkage(schema, name, &relationship.data));
        }

        Self {
            errors,
            validated: resource.all(),
        }
    }

    pub fn relation(schema: &ResourceSchema, field: &str, linkage: &Linkage) -> Self {
        let errors = check_linkage(schema, field, linkage);
        let mut validated = Map::new();
        validated.insert(
            field.to_string(),
            serde_json::to_value(linkage).unwrap_or(Value::Null),
        );
        Self { errors, validated }
    }

    pub fn query(schema: &ResourceSchema, query: &QueryParams) -> Self {
        let mut errors = Vec::new();

        for name in query.0.keys() {
            if !QUERY_PARAMETERS.contains(&name.as_str()) {
                errors.push(ValidationError::new(
                    name,
                    ValidationErrorKind::InvalidValue,
                    format!("Query parameter '{}' is not supported", name),
                ));
            }
        }

        if let Some(filter) = query.filter() {
            for key in filter.keys() {
                if key != "id" && schema.attribute(key).is_none() {
                    errors.push(
                        ValidationError::new(
                            "filter",
                            ValidationErrorKind::InvalidValue,
                            format!("Cannot filter '{}' by '{}'", schema.resource_type, key),
                        )
                        .actual(key.clone()),
                    );
                }
            }
        }

        Self {
            errors,
            validated: query.0.clone(),
        }
    }
}

fn check_linkage(schema: &ResourceSchema, field: &str, linkage: &Linkage) -> Vec<ValidationError> {
    let Some(def) = schema.relationship(field) else {
        return vec![ValidationError::new(
            field,
            ValidationErrorKind::UndefinedField,
            format!("Relationship '{}' is not defined for '{}'", field, schema.resource_type),
        )];
    };

    let mut errors = Vec::new();
    if def.to_many() != linkage.is_to_many() {
        let expected = if def.to_many() { "to-many" } else { "to-one" };
        errors.push(
            ValidationError::new(
                field,
                ValidationErrorKind::RelationshipError,
                format!("Relationship '{}' is {}", field, expected),
            )
            .expected(expected),
        );
    }

    for identifier in linkage.identifiers() {
        if identifier.resource_type != def.inverse {
            errors.push(
                ValidationError::new(
                    field,
                    ValidationErrorKind::RelationshipError,
                    format!(
                        "Relationship '{}' expects '{}' resources, found '{}'",
                        field, def.inverse, identifier.resource_type
                    ),
                )
                .expected(def.inverse.to_string())
                .actual(identifier.resource_type.to_string()),
            );
        }
    }
    errors
}

/// Validators for one resource type, driven by its schema.
#[derive(Debug, Clone)]
pub struct SchemaValidatorFactory {
    schema: ResourceSchema,
}

impl SchemaValidatorFactory {
    pub fn new(schema: ResourceSchema) -> Self {
        Self { schema }
    }
}

impl ValidatorFactory for SchemaValidatorFactory {
    fn store(&self, _context: &RequestContext, operation: &Create) -> Option<Box<dyn Validator>> {
        Some(Box::new(SchemaValidator::resource(&self.schema, &operation.data, false)))
    }

    fn update(
        &self,
        _context: &RequestContext,
        operation: &Update,
        _model: &Model,
    ) -> Option<Box<dyn Validator>> {
        Some(Box::new(SchemaValidator::resource(&self.schema, &operation.data, true)))
    }

    fn relation(
        &self,
        _context: &RequestContext,
        _model: &Model,
        field: &str,
        linkage: &Linkage,
    ) -> Option<Box<dyn Validator>> {
        Some(Box::new(SchemaValidator::relation(&self.schema, field, linkage)))
    }

    fn query_one(
        &self,
        _context: &RequestContext,
        query: &QueryParams,
    ) -> Option<Box<dyn Validator>> {
        Some(Box::new(SchemaValidator::query(&self.schema, query)))
    }

    fn query_many(
        &self,
        _context: &RequestContext,
        query: &QueryParams,
    ) -> Option<Box<dyn Validator>> {
        Some(Box::new(SchemaValidator::query(&self.schema, query)))
    }
}

/// Schema-driven validators for every type the container knows about.
#[derive(Debug, Clone)]
pub struct SchemaValidators {
    schemas: Arc<SchemaContainer>,
}

impl SchemaValidators {
    pub fn new(schemas: Arc<SchemaContainer>) -> Self {
        Self { schemas }
    }
}

impl ValidatorContainer for SchemaValidators {
    fn validators_for(&self, resource_type: &ResourceType) -> Option<Arc<dyn ValidatorFactory>> {
        self.schemas.schema_for(resource_type).map(|schema| {
            Arc::new(SchemaValidatorFactory::new(schema.clone())) as Arc<dyn ValidatorFactory>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ResourceId, ResourceIdentifier};
    use crate::schema::{Cardinality, DataType};
    use serde_json::json;

    fn rt(value: &str) -> ResourceType {
        ResourceType::new(value).unwrap()
    }

    fn posts() -> ResourceSchema {
        ResourceSchema::new(rt("posts"))
            .with_attribute("title", DataType::String, true)
            .with_attribute("views", DataType::Number, false)
            .with_relationship("tags", rt("tags"), Cardinality::ToMany)
            .with_relationship("author", rt("users"), Cardinality::ToOne)
    }

    fn resource(value: Value) -> ResourceObject {
        serde_json::from_value(value).unwrap()
    }

    fn kinds(validator: &SchemaValidator) -> Vec<(String, ValidationErrorKind)> {
        validator.errors().into_iter().map(|e| (e.field, e.kind)).collect()
    }

    #[test]
    fn test_valid_resource_passes_through() {
        let data = resource(json!({
            "type": "posts",
            "attributes": {"title": "Hello", "views": 3},
            "relationships": {"tags": {"data": [{"type": "tags", "id": "1"}]}}
        }));
        let validator = SchemaValidator::resource(&posts(), &data, false);

        assert!(!validator.fails());
        assert_eq!(validator.validated(), data.all());
    }

    #[test]
    fn test_resource_errors() {
        let data = resource(json!({
            "type": "posts",
            "attributes": {"views": "many", "colour": "red"},
            "relationships": {"author": {"data": [{"type": "users", "id": "1"}]}}
        }));
        let validator = SchemaValidator::resource(&posts(), &data, false);

        let mut found = kinds(&validator);
        found.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            found,
            vec![
                ("author".to_string(), ValidationErrorKind::RelationshipError),
                ("colour".to_string(), ValidationErrorKind::UndefinedField),
                ("title".to_string(), ValidationErrorKind::MissingRequired),
                ("views".to_string(), ValidationErrorKind::TypeMismatch),
            ]
        );
    }

    #[test]
    fn test_partial_update_skips_required() {
        let data = resource(json!({"type": "posts", "id": "1", "attributes": {"views": 4}}));
        assert!(!SchemaValidator::resource(&posts(), &data, true).fails());
        assert!(SchemaValidator::resource(&posts(), &data, false).fails());
    }

    #[test]
    fn test_relation_checks_inverse_type() {
        let linkage = Linkage::ToMany(vec![ResourceIdentifier::new(
            rt("users"),
            ResourceId::new("1").unwrap(),
        )]);
        let validator = SchemaValidator::relation(&posts(), "tags", &linkage);

        assert_eq!(
            kinds(&validator),
            vec![("tags".to_string(), ValidationErrorKind::RelationshipError)]
        );
        assert_eq!(validator.validated()["tags"], json!([{"type": "users", "id": "1"}]));
    }

    #[test]
    fn test_query_parameters() {
        let query: QueryParams = serde_json::from_value(json!({
            "filter": {"title": "x", "colour": "red"},
            "sort": "-title",
            "bogus": "1"
        }))
        .unwrap();
        let validator = SchemaValidator::query(&posts(), &query);

        let mut found = kinds(&validator);
        found.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            found,
            vec![
                ("bogus".to_string(), ValidationErrorKind::InvalidValue),
                ("filter".to_string(), ValidationErrorKind::InvalidValue),
            ]
        );
    }

    #[test]
    fn test_container_knows_schema_types_only() {
        let validators = SchemaValidators::new(Arc::new(SchemaContainer::new(vec![posts()])));
        assert!(validators.validators_for(&rt("posts")).is_some());
        assert!(validators.validators_for(&rt("tags")).is_none());
    }
}
