use std::collections::HashMap;

use crate::atomic::operations::Operation;
use crate::atomic::values::Target;
use crate::model::{
    Error, ErrorList, Linkage, ResourceId, ResourceIdentifier, ResourceObject, ResourceType,
};

/// Server ids assigned to client-issued local ids during one request.
#[derive(Debug, Clone, Default)]
pub struct LidMap {
    ids: HashMap<(ResourceType, ResourceId), ResourceId>,
}

fn unknown_lid(pointer: String, resource_type: &ResourceType, lid: &ResourceId) -> Error {
    Error::new(400)
        .with_title("Bad Request")
        .with_detail(format!(
            "Local id '{}' of type '{}' was not assigned by an earlier operation.",
            lid, resource_type
        ))
        .with_pointer(pointer)
}

impl LidMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource_type: ResourceType, lid: ResourceId, id: ResourceId) {
        self.ids.insert((resource_type, lid), id);
    }

    pub fn get(&self, resource_type: &ResourceType, lid: &ResourceId) -> Option<&ResourceId> {
        self.ids.get(&(resource_type.clone(), lid.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Replace every lid reference in `operation` with its server id.
    ///
    /// The lid a create operation declares for its own resource is left in
    /// place; it is what [`insert`](Self::insert) is later called with.
    pub fn resolve(&self, operation: Operation) -> Result<Operation, ErrorList> {
        let mut errors = ErrorList::new();

        let operation = match operation {
            Operation::Create(mut op) => {
                self.resolve_relationships(&mut op.data, &mut errors);
                Operation::Create(op)
            }
            Operation::Update(mut op) => {
                if let Some(target) = op.target.as_mut() {
                    self.resolve_target(target, &mut errors);
                }
                if op.data.id.is_none() {
                    if let Some(lid) = op.data.lid.clone() {
                        match self.get(&op.data.resource_type, &lid) {
                            Some(id) => {
                                op.data.id = Some(id.clone());
                                op.data.lid = None;
                            }
                            None => errors.push(unknown_lid(
                                "/data/lid".into(),
                                &op.data.resource_type,
                                &lid,
                            )),
                        }
                    }
                }
                self.resolve_relationships(&mut op.data, &mut errors);
                Operation::Update(op)
            }
            Operation::Delete(mut op) => {
                self.resolve_target(&mut op.target, &mut errors);
                Operation::Delete(op)
            }
            Operation::UpdateToOne(mut op) => {
                self.resolve_target(&mut op.target, &mut errors);
                if let Some(identifier) = op.data.as_mut() {
                    self.resolve_identifier(identifier, "/data".into(), &mut errors);
                }
                Operation::UpdateToOne(op)
            }
            Operation::UpdateToMany(mut op) => {
                self.resolve_target(&mut op.target, &mut errors);
                for (index, identifier) in op.data.iter_mut().enumerate() {
                    self.resolve_identifier(identifier, format!("/data/{}", index), &mut errors);
                }
                Operation::UpdateToMany(op)
            }
        };

        if errors.is_empty() {
            Ok(operation)
        } else {
            Err(errors)
        }
    }

    fn resolve_target(&self, target: &mut Target, errors: &mut ErrorList) {
        let Target::Ref(reference) = target else {
            return;
        };
        if reference.id.is_some() {
            return;
        }
        let Some(lid) = reference.lid.clone() else {
            return;
        };
        match self.get(&reference.resource_type, &lid) {
            Some(id) => {
                reference.id = Some(id.clone());
                reference.lid = None;
            }
            None => errors.push(unknown_lid("/ref/lid".into(), &reference.resource_type, &lid)),
        }
    }

    fn resolve_identifier(
        &self,
        identifier: &mut ResourceIdentifier,
        pointer: String,
        errors: &mut ErrorList,
    ) {
        if identifier.id.is_some() {
            return;
        }
        let Some(lid) = identifier.lid.clone() else {
            return;
        };
        match self.get(&identifier.resource_type, &lid) {
            Some(id) => {
                identifier.id = Some(id.clone());
                identifier.lid = None;
            }
            None => errors.push(unknown_lid(
                format!("{}/lid", pointer),
                &identifier.resource_type,
                &lid,
            )),
        }
    }

    fn resolve_relationships(&self, resource: &mut ResourceObject, errors: &mut ErrorList) {
        for (name, relationship) in resource.relationships.iter_mut() {
            let base = format!("/data/relationships/{}/data", name);
            match &mut relationship.data {
                Linkage::ToOne(Some(identifier)) => {
                    self.resolve_identifier(identifier, base, errors)
                }
                Linkage::ToOne(None) => {}
                Linkage::ToMany(identifiers) => {
                    for (index, identifier) in identifiers.iter_mut().enumerate() {
                        self.resolve_identifier(identifier, format!("{}/{}", base, index), errors);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic::operations::{Delete, UpdateToMany};
    use crate::atomic::values::{OpCode, Ref};
    use serde_json::{json, Map};

    fn rt(value: &str) -> ResourceType {
        ResourceType::new(value).unwrap()
    }

    fn id(value: &str) -> ResourceId {
        ResourceId::new(value).unwrap()
    }

    fn lids() -> LidMap {
        let mut lids = LidMap::new();
        lids.insert(rt("posts"), id("p1"), id("100"));
        lids.insert(rt("tags"), id("t1"), id("200"));
        lids
    }

    #[test]
    fn test_resolves_target_and_data() {
        let operation = Operation::UpdateToMany(
            UpdateToMany::new(
                OpCode::Add,
                Target::Ref(Ref::local(rt("posts"), id("p1")).with_relationship("tags")),
                vec![
                    ResourceIdentifier::local(rt("tags"), id("t1")),
                    ResourceIdentifier::new(rt("tags"), id("5")),
                ],
                Map::new(),
            )
            .unwrap(),
        );

        let resolved = lids().resolve(operation).unwrap();

        assert_eq!(
            resolved.to_value(),
            json!({
                "op": "add",
                "ref": {"type": "posts", "id": "100", "relationship": "tags"},
                "data": [{"type": "tags", "id": "200"}, {"type": "tags", "id": "5"}]
            })
        );
    }

    #[test]
    fn test_create_keeps_its_own_lid() {
        let data: ResourceObject = serde_json::from_value(json!({
            "type": "posts",
            "lid": "p2",
            "relationships": {"tags": {"data": [{"type": "tags", "lid": "t1"}]}}
        }))
        .unwrap();
        let operation = Operation::Create(crate::atomic::operations::Create {
            target: None,
            data,
            meta: Map::new(),
        });

        let Operation::Create(create) = lids().resolve(operation).unwrap() else {
            panic!("expected a create");
        };
        assert_eq!(create.data.lid, Some(id("p2")));
        assert_eq!(create.data.relationships["tags"].data.identifiers()[0].id, Some(id("200")));
    }

    #[test]
    fn test_unknown_lid_is_a_bad_request() {
        let operation = Operation::Delete(Delete {
            target: Target::Ref(Ref::local(rt("posts"), id("nope"))),
            meta: Map::new(),
        });

        let errors = lids().resolve(operation).unwrap_err();
        assert_eq!(errors.status(), Some(400));
        assert_eq!(errors.iter().next().unwrap().pointer(), Some("/ref/lid"));
    }

    #[test]
    fn test_lids_are_scoped_by_type() {
        let operation = Operation::Delete(Delete {
            target: Target::Ref(Ref::local(rt("tags"), id("p1"))),
            meta: Map::new(),
        });
        assert!(lids().resolve(operation).is_err());
    }
}
