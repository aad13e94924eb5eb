use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::atomic::values::{OpCode, ParsedHref, Ref, Target};
use crate::error::ParseError;
use crate::model::{ResourceIdentifier, ResourceObject, ResourceType};

/// `add` without a relationship target: create a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Create {
    pub target: Option<ParsedHref>,
    pub data: ResourceObject,
    pub meta: Map<String, Value>,
}

/// `update` of a whole resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub target: Option<Target>,
    pub data: ResourceObject,
    pub meta: Map<String, Value>,
}

/// `remove` of a whole resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub target: Target,
    pub meta: Map<String, Value>,
}

/// `update` of a to-one relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateToOne {
    pub(crate) target: Target,
    pub data: Option<ResourceIdentifier>,
    pub meta: Map<String, Value>,
}

/// `add`, `update` or `remove` of members of a to-many relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateToMany {
    pub op: OpCode,
    pub(crate) target: Target,
    pub data: Vec<ResourceIdentifier>,
    pub meta: Map<String, Value>,
}

fn require_relationship(target: &Target) -> Result<(), ParseError> {
    match target.relationship() {
        Some(_) => Ok(()),
        None => Err(ParseError::new(
            "",
            "Expecting the operation target to be a relationship.",
        )),
    }
}

const RELATIONSHIP_INVARIANT: &str =
    "relationship operations are always built with a relationship target";

impl UpdateToOne {
    pub fn new(
        target: Target,
        data: Option<ResourceIdentifier>,
        meta: Map<String, Value>,
    ) -> Result<Self, ParseError> {
        require_relationship(&target)?;
        Ok(Self { target, data, meta })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn field_name(&self) -> &str {
        self.target.relationship().expect(RELATIONSHIP_INVARIANT)
    }
}

impl UpdateToMany {
    pub fn new(
        op: OpCode,
        target: Target,
        data: Vec<ResourceIdentifier>,
        meta: Map<String, Value>,
    ) -> Result<Self, ParseError> {
        require_relationship(&target)?;
        Ok(Self {
            op,
            target,
            data,
            meta,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn field_name(&self) -> &str {
        self.target.relationship().expect(RELATIONSHIP_INVARIANT)
    }
}

/// One mutation requested by an atomic operations document.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Create(Create),
    Update(Update),
    Delete(Delete),
    UpdateToOne(UpdateToOne),
    UpdateToMany(UpdateToMany),
}

impl Operation {
    pub fn op(&self) -> OpCode {
        match self {
            Operation::Create(_) => OpCode::Add,
            Operation::Update(_) | Operation::UpdateToOne(_) => OpCode::Update,
            Operation::Delete(_) => OpCode::Remove,
            Operation::UpdateToMany(op) => op.op,
        }
    }

    /// The ref this operation addresses, synthesized from the resource
    /// object when the operation carried no explicit target.
    pub fn reference(&self) -> Ref {
        match self {
            Operation::Create(op) => ref_from_resource(&op.data),
            Operation::Update(op) => match &op.target {
                Some(target) => target.to_ref(),
                None => ref_from_resource(&op.data),
            },
            Operation::Delete(op) => op.target.to_ref(),
            Operation::UpdateToOne(op) => op.target.to_ref(),
            Operation::UpdateToMany(op) => op.target.to_ref(),
        }
    }

    pub fn resource_type(&self) -> &ResourceType {
        match self {
            Operation::Create(op) => &op.data.resource_type,
            Operation::Update(op) => op
                .target
                .as_ref()
                .map(Target::resource_type)
                .unwrap_or(&op.data.resource_type),
            Operation::Delete(op) => op.target.resource_type(),
            Operation::UpdateToOne(op) => op.target.resource_type(),
            Operation::UpdateToMany(op) => op.target.resource_type(),
        }
    }

    pub fn meta(&self) -> &Map<String, Value> {
        match self {
            Operation::Create(op) => &op.meta,
            Operation::Update(op) => &op.meta,
            Operation::Delete(op) => &op.meta,
            Operation::UpdateToOne(op) => &op.meta,
            Operation::UpdateToMany(op) => &op.meta,
        }
    }

    /// The relationship field this operation modifies, if any.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Operation::UpdateToOne(op) => Some(op.field_name()),
            Operation::UpdateToMany(op) => Some(op.field_name()),
            _ => None,
        }
    }

    pub fn is_creating(&self) -> bool {
        matches!(self, Operation::Create(_))
    }

    pub fn is_updating(&self) -> bool {
        matches!(self, Operation::Update(_))
    }

    pub fn is_creating_or_updating(&self) -> bool {
        self.is_creating() || self.is_updating()
    }

    pub fn is_deleting(&self) -> bool {
        matches!(self, Operation::Delete(_))
    }

    /// Replacing a relationship: a to-one update or a to-many `update`.
    pub fn is_updating_relationship(&self) -> bool {
        match self {
            Operation::UpdateToOne(_) => true,
            Operation::UpdateToMany(op) => op.op == OpCode::Update,
            _ => false,
        }
    }

    pub fn is_attaching_relationship(&self) -> bool {
        matches!(self, Operation::UpdateToMany(op) if op.op == OpCode::Add)
    }

    pub fn is_detaching_relationship(&self) -> bool {
        matches!(self, Operation::UpdateToMany(op) if op.op == OpCode::Remove)
    }

    pub fn is_modifying_relationship(&self) -> bool {
        matches!(self, Operation::UpdateToOne(_) | Operation::UpdateToMany(_))
    }

    /// Render back to the wire shape it was parsed from.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("op".into(), json!(self.op()));

        let (target, data) = match self {
            Operation::Create(op) => (
                op.target.clone().map(Target::Href),
                Some(json!(op.data)),
            ),
            Operation::Update(op) => (op.target.clone(), Some(json!(op.data))),
            Operation::Delete(op) => (Some(op.target.clone()), None),
            Operation::UpdateToOne(op) => (Some(op.target.clone()), Some(json!(op.data))),
            Operation::UpdateToMany(op) => (Some(op.target.clone()), Some(json!(op.data))),
        };

        match target {
            Some(Target::Href(href)) => {
                object.insert("href".into(), json!(href.href));
            }
            Some(Target::Ref(reference)) => {
                object.insert("ref".into(), json!(reference));
            }
            None => {}
        }
        if let Some(data) = data {
            object.insert("data".into(), data);
        }
        if !self.meta().is_empty() {
            object.insert("meta".into(), Value::Object(self.meta().clone()));
        }

        Value::Object(object)
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn ref_from_resource(resource: &ResourceObject) -> Ref {
    Ref {
        resource_type: resource.resource_type.clone(),
        id: resource.id.clone(),
        lid: resource.lid.clone(),
        relationship: None,
    }
}

/// A non-empty, ordered list of operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOfOperations(Vec<Operation>);

impl ListOfOperations {
    pub fn new(operations: Vec<Operation>) -> Result<Self, ParseError> {
        if operations.is_empty() {
            return Err(ParseError::new(
                "/atomic:operations",
                "Expecting at least one atomic operation.",
            ));
        }
        Ok(Self(operations))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.0.iter()
    }

    pub fn to_value(&self) -> Value {
        json!({ "atomic:operations": self.0 })
    }
}

impl IntoIterator for ListOfOperations {
    type Item = Operation;
    type IntoIter = std::vec::IntoIter<Operation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::values::Href;
    use crate::model::ResourceId;

    fn rt(value: &str) -> ResourceType {
        ResourceType::new(value).unwrap()
    }

    fn rid(value: &str) -> ResourceId {
        ResourceId::new(value).unwrap()
    }

    #[test]
    fn test_relationship_operations_require_a_relationship() {
        let target = Target::Ref(Ref::new(rt("posts"), rid("1")));
        assert!(UpdateToOne::new(target.clone(), None, Map::new()).is_err());
        assert!(UpdateToMany::new(OpCode::Add, target, vec![], Map::new()).is_err());
    }

    #[test]
    fn test_create_synthesizes_ref_from_data() {
        let mut data = ResourceObject::new(rt("posts"));
        data.lid = Some(rid("tmp-1"));
        let op = Operation::Create(Create {
            target: None,
            data,
            meta: Map::new(),
        });

        let reference = op.reference();
        assert_eq!(reference.resource_type, "posts");
        assert_eq!(reference.lid, Some(rid("tmp-1")));
        assert_eq!(reference.id, None);
        assert_eq!(op.resource_type(), &rt("posts"));
        assert!(op.is_creating() && op.is_creating_or_updating());
        assert_eq!(op.field_name(), None);
    }

    #[test]
    fn test_relationship_predicates() {
        let target = Target::Href(ParsedHref {
            href: Href::new("/posts/1/relationships/tags"),
            resource_type: rt("posts"),
            id: Some(rid("1")),
            relationship: Some("tags".into()),
        });

        let attach = Operation::UpdateToMany(
            UpdateToMany::new(OpCode::Add, target.clone(), vec![], Map::new()).unwrap(),
        );
        assert!(attach.is_attaching_relationship());
        assert!(!attach.is_updating_relationship());
        assert!(attach.is_modifying_relationship());
        assert_eq!(attach.field_name(), Some("tags"));

        let replace = Operation::UpdateToMany(
            UpdateToMany::new(OpCode::Update, target.clone(), vec![], Map::new()).unwrap(),
        );
        assert!(replace.is_updating_relationship());

        let detach = Operation::UpdateToMany(
            UpdateToMany::new(OpCode::Remove, target, vec![], Map::new()).unwrap(),
        );
        assert!(detach.is_detaching_relationship());
        assert_eq!(detach.op(), OpCode::Remove);
    }

    #[test]
    fn test_delete_serialization_has_no_data() {
        let mut meta = Map::new();
        meta.insert("reason".into(), json!("spam"));
        let op = Operation::Delete(Delete {
            target: Target::Ref(Ref::new(rt("posts"), rid("1"))),
            meta,
        });

        assert_eq!(
            op.to_value(),
            json!({
                "op": "remove",
                "ref": {"type": "posts", "id": "1"},
                "meta": {"reason": "spam"}
            })
        );
    }

    #[test]
    fn test_empty_list_is_rejected() {
        assert!(ListOfOperations::new(vec![]).is_err());
    }
}
