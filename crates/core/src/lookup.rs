//! Lookup resolver.
//!
//! Attaches `$lookup` data to documents and keeps it current as referenced
//! documents change. Forward lookups resolve the reference stored in an
//! attribute; reverse lookups collect the documents whose reference attribute
//! points at the owner. One level of nesting is supported on forward targets.

use crate::document::{Document, LookupValue};
use crate::hierarchy::Hierarchy;
use crate::ids::{ClassRef, DocId};
use crate::options::{LookupSpec, LookupTarget, ReverseLookup};
use crate::tx::DocChange;
use crate::value::Value;
use tracing::warn;

/// Where the resolver finds referenced documents.
pub trait DocSource {
    /// Returns the document with the given id.
    fn get(&self, id: &DocId) -> Option<Document>;

    /// Returns the documents of `class` whose `attribute` holds `owner`, or
    /// `None` when the source cannot tell.
    fn attached(&self, class: &ClassRef, attribute: &str, owner: &DocId) -> Option<Vec<Document>>;

    /// Whether a miss from `get` proves the document does not exist.
    fn is_complete(&self) -> bool {
        true
    }
}

/// Outcome of patching `$lookup` data for one change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LookupPatch {
    /// The change does not affect the lookup data.
    Unchanged,
    /// The lookup data was patched in place.
    Patched,
    /// The lookup data can no longer be proven correct.
    NeedsRefresh,
}

/// Reads a reference attribute. Falsy values are not references.
pub fn reference_of(hierarchy: &Hierarchy, doc: &Document, attribute: &str) -> Option<DocId> {
    let value = doc.resolve_attribute(hierarchy, &doc.class, attribute)?;
    if value.is_falsy() {
        return None;
    }
    value.as_str().map(DocId::from)
}

fn members_mut<'d>(doc: &'d mut Document, name: &str) -> &'d mut Vec<Document> {
    let entry = doc
        .lookup
        .entry(name.to_string())
        .or_insert_with(|| LookupValue::Many(Vec::new()));
    if !matches!(entry, LookupValue::Many(_)) {
        *entry = LookupValue::Many(Vec::new());
    }
    match entry {
        LookupValue::Many(members) => members,
        LookupValue::One(_) => unreachable!("entry normalized to Many above"),
    }
}

/// Resolves and patches `$lookup` data against a document source.
pub struct Resolver<'a, S: DocSource + ?Sized> {
    hierarchy: &'a Hierarchy,
    source: &'a S,
}

impl<'a, S: DocSource + ?Sized> Resolver<'a, S> {
    pub fn new(hierarchy: &'a Hierarchy, source: &'a S) -> Self {
        Self { hierarchy, source }
    }

    /// Populates `doc.lookup` per `spec`. Returns false if some entry could
    /// not be resolved from the source and may therefore be missing.
    pub fn resolve(&self, doc: &mut Document, spec: &LookupSpec) -> bool {
        self.resolve_level(doc, spec, true)
    }

    /// Recomputes forward entries only, leaving reverse entries as they are.
    pub fn resolve_forward(&self, doc: &mut Document, spec: &LookupSpec) -> bool {
        self.resolve_forward_level(doc, spec, true)
    }

    fn resolve_level(&self, doc: &mut Document, spec: &LookupSpec, top: bool) -> bool {
        let mut complete = self.resolve_forward_level(doc, spec, top);

        for (name, reverse) in spec.reverse_entries() {
            match self.source.attached(&reverse.class, &reverse.attribute, &doc.id) {
                Some(members) => {
                    let members = members.into_iter().map(|m| m.without_lookup()).collect();
                    doc.lookup.insert(name.to_string(), LookupValue::Many(members));
                }
                None => {
                    doc.lookup.remove(name);
                    if top {
                        complete = false;
                    }
                }
            }
        }

        complete
    }

    fn resolve_forward_level(&self, doc: &mut Document, spec: &LookupSpec, top: bool) -> bool {
        let mut complete = true;

        for (attribute, target) in spec.forward_entries() {
            doc.lookup.remove(attribute);
            let Some(reference) = reference_of(self.hierarchy, doc, attribute) else {
                continue;
            };
            match self.source.get(&reference) {
                Some(found) => {
                    let resolved = self.forward_target(found, target, top);
                    doc.lookup
                        .insert(attribute.to_string(), LookupValue::One(Box::new(resolved)));
                }
                // Unknown nested targets are omitted
                None if top && !self.source.is_complete() => complete = false,
                None => {}
            }
        }

        complete
    }

    fn forward_target(&self, found: Document, target: &LookupTarget, top: bool) -> Document {
        let mut resolved = found.without_lookup();
        if top {
            if let Some(nested) = target.nested.as_deref() {
                self.resolve_level(&mut resolved, nested, false);
            }
        }
        resolved
    }

    /// Patches `doc.lookup` for one document change.
    pub fn patch(&self, doc: &mut Document, spec: &LookupSpec, change: &DocChange<'_>) -> LookupPatch {
        self.patch_level(doc, spec, change, true)
    }

    fn patch_level(&self, doc: &mut Document, spec: &LookupSpec, change: &DocChange<'_>, top: bool) -> LookupPatch {
        let mut outcome = LookupPatch::Unchanged;

        for (attribute, target) in spec.forward_entries() {
            outcome = outcome.max(self.patch_forward(doc, attribute, target, change, top));
            if outcome == LookupPatch::NeedsRefresh {
                return outcome;
            }
        }
        for (name, reverse) in spec.reverse_entries() {
            outcome = outcome.max(self.patch_reverse(doc, name, reverse, change));
            if outcome == LookupPatch::NeedsRefresh {
                return outcome;
            }
        }

        outcome
    }

    fn patch_forward(
        &self,
        doc: &mut Document,
        attribute: &str,
        target: &LookupTarget,
        change: &DocChange<'_>,
        top: bool,
    ) -> LookupPatch {
        let mut outcome = LookupPatch::Unchanged;
        let current = doc
            .lookup
            .get(attribute)
            .and_then(LookupValue::as_one)
            .map(|d| d.id == *change.id())
            .unwrap_or(false);

        match change {
            DocChange::Created(created) => {
                let points_here = reference_of(self.hierarchy, doc, attribute).as_ref() == Some(&created.id);
                if points_here && !doc.lookup.contains_key(attribute) {
                    let resolved = self.forward_target((*created).clone(), target, top);
                    doc.lookup
                        .insert(attribute.to_string(), LookupValue::One(Box::new(resolved)));
                    return LookupPatch::Patched;
                }
            }
            DocChange::Removed { .. } if current => {
                doc.lookup.remove(attribute);
                return LookupPatch::Patched;
            }
            DocChange::Updated { .. } | DocChange::Mixin { .. } if current => {
                if let Some(LookupValue::One(found)) = doc.lookup.get_mut(attribute) {
                    match change.apply(found) {
                        Ok(true) => outcome = LookupPatch::Patched,
                        Ok(false) => {}
                        Err(err) => {
                            warn!(doc = %found.id, error = %err, "cannot patch lookup target");
                            return LookupPatch::NeedsRefresh;
                        }
                    }
                }
            }
            _ => {}
        }

        if top {
            if let (Some(nested), Some(LookupValue::One(found))) =
                (target.nested.as_deref(), doc.lookup.get_mut(attribute))
            {
                outcome = outcome.max(self.patch_level(found, nested, change, false));
            }
        }
        outcome
    }

    fn patch_reverse(
        &self,
        doc: &mut Document,
        name: &str,
        reverse: &ReverseLookup,
        change: &DocChange<'_>,
    ) -> LookupPatch {
        if !self.hierarchy.is_derived(change.class(), &reverse.class) {
            return LookupPatch::Unchanged;
        }
        let owner = doc.id.clone();
        let position = doc
            .lookup
            .get(name)
            .and_then(LookupValue::as_many)
            .and_then(|members| members.iter().position(|m| m.id == *change.id()));

        match (change, position) {
            (DocChange::Created(created), None) => {
                if reference_of(self.hierarchy, created, &reverse.attribute).as_ref() == Some(&owner) {
                    members_mut(doc, name).push(created.without_lookup());
                    return LookupPatch::Patched;
                }
                LookupPatch::Unchanged
            }
            (DocChange::Created(created), Some(pos)) => {
                members_mut(doc, name)[pos] = created.without_lookup();
                LookupPatch::Patched
            }
            (DocChange::Removed { .. }, Some(pos)) => {
                members_mut(doc, name).remove(pos);
                LookupPatch::Patched
            }
            (DocChange::Removed { .. }, None) => LookupPatch::Unchanged,
            (_, Some(pos)) => {
                let members = members_mut(doc, name);
                match change.apply(&mut members[pos]) {
                    Ok(false) => LookupPatch::Unchanged,
                    Ok(true) => {
                        if reference_of(self.hierarchy, &members[pos], &reverse.attribute).as_ref() != Some(&owner) {
                            members.remove(pos);
                        }
                        LookupPatch::Patched
                    }
                    Err(err) => {
                        warn!(doc = %change.id(), error = %err, "cannot patch lookup member");
                        LookupPatch::NeedsRefresh
                    }
                }
            }
            (_, None) => {
                // A member of this collection we do not hold
                if change.attached_to() == Some(&owner)
                    || change.sets(&reverse.attribute, &Value::from(&owner))
                {
                    LookupPatch::NeedsRefresh
                } else {
                    LookupPatch::Unchanged
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::{DocumentUpdate, Tx, TxFactory};
    use std::collections::BTreeMap;

    struct MapSource {
        docs: BTreeMap<DocId, Document>,
        complete: bool,
    }

    impl DocSource for MapSource {
        fn get(&self, id: &DocId) -> Option<Document> {
            self.docs.get(id).cloned()
        }

        fn attached(&self, class: &ClassRef, attribute: &str, owner: &DocId) -> Option<Vec<Document>> {
            if !self.complete {
                return None;
            }
            let h = hierarchy();
            Some(
                self.docs
                    .values()
                    .filter(|d| h.is_derived(&d.class, class))
                    .filter(|d| reference_of(&h, d, attribute).as_ref() == Some(owner))
                    .cloned()
                    .collect(),
            )
        }

        fn is_complete(&self) -> bool {
            self.complete
        }
    }

    fn hierarchy() -> Hierarchy {
        Hierarchy::builder()
            .class("core:class:Doc", None, Vec::<String>::new())
            .class("core:class:Space", Some("core:class:Doc"), ["name"])
            .class("core:class:AttachedDoc", Some("core:class:Doc"), ["attachedTo"])
            .class("test:class:Comment", Some("core:class:AttachedDoc"), ["message"])
            .build()
            .unwrap()
    }

    fn source() -> MapSource {
        let mut docs = BTreeMap::new();
        let space = Document::new("sp1", "core:class:Space", "sp1").with("name", "main");
        let parent = Document::new("p1", "core:class:Space", "sp1").with("name", "parent");
        let c1 = Document::new("c1", "test:class:Comment", "sp1")
            .with("attachedTo", "p1")
            .with("message", "one");
        let c2 = Document::new("c2", "test:class:Comment", "sp1")
            .with("attachedTo", 0i64)
            .with("message", "orphan");
        for d in [space, parent, c1, c2] {
            docs.insert(d.id.clone(), d);
        }
        MapSource { docs, complete: true }
    }

    #[test]
    fn test_resolve_forward_and_nested() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let mut comment = src.get(&"c1".into()).unwrap();
        let spec = LookupSpec::new().forward_nested(
            "attachedTo",
            "core:class:Space",
            LookupSpec::new().forward("space", "core:class:Space"),
        );
        assert!(resolver.resolve(&mut comment, &spec));
        let parent = comment.lookup.get("attachedTo").and_then(LookupValue::as_one).unwrap();
        assert_eq!(parent.id.as_str(), "p1");
        let space = parent.lookup.get("space").and_then(LookupValue::as_one).unwrap();
        assert_eq!(space.id.as_str(), "sp1");
    }

    #[test]
    fn test_resolve_nested_unknown_is_omitted() {
        let h = hierarchy();
        let mut src = source();
        src.docs.remove(&DocId::from("sp1"));
        let resolver = Resolver::new(&h, &src);
        let mut comment = src.get(&"c1".into()).unwrap();
        let spec = LookupSpec::new().forward_nested(
            "attachedTo",
            "core:class:Space",
            LookupSpec::new().forward("space", "core:class:Space"),
        );
        assert!(resolver.resolve(&mut comment, &spec));
        let parent = comment.lookup.get("attachedTo").and_then(LookupValue::as_one).unwrap();
        assert!(parent.lookup.get("space").is_none());
    }

    #[test]
    fn test_resolve_reverse_skips_falsy() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let mut parent = src.get(&"p1".into()).unwrap();
        let spec = LookupSpec::new().reverse("comments", "test:class:Comment");
        assert!(resolver.resolve(&mut parent, &spec));
        let members = parent.lookup.get("comments").and_then(LookupValue::as_many).unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].id.as_str(), "c1");
    }

    #[test]
    fn test_resolve_incomplete_source() {
        let h = hierarchy();
        let mut src = source();
        src.complete = false;
        let resolver = Resolver::new(&h, &src);
        let mut parent = src.get(&"p1".into()).unwrap();
        let spec = LookupSpec::new().reverse("comments", "test:class:Comment");
        assert!(!resolver.resolve(&mut parent, &spec));
    }

    #[test]
    fn test_patch_reverse_lifecycle() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let spec = LookupSpec::new().reverse("comments", "test:class:Comment");
        let mut parent = src.get(&"p1".into()).unwrap();
        resolver.resolve(&mut parent, &spec);

        let factory = TxFactory::new();
        let owner = DocId::from("p1");
        let create = factory.add_collection(
            "test:class:Comment",
            "sp1",
            &owner,
            "core:class:Space",
            "comments",
            [("message", "two")],
        );
        let child = create.object_id().cloned().unwrap();
        let change = DocChange::from_tx(&create).unwrap();
        assert_eq!(resolver.patch(&mut parent, &spec, &change), LookupPatch::Patched);
        assert_eq!(parent.lookup["comments"].as_many().unwrap().len(), 2);

        let update = factory.update_collection(
            "test:class:Comment",
            "sp1",
            &child,
            &owner,
            DocumentUpdate::new().set("message", "edited"),
        );
        let change = DocChange::from_tx(&update).unwrap();
        assert_eq!(resolver.patch(&mut parent, &spec, &change), LookupPatch::Patched);
        let edited = &parent.lookup["comments"].as_many().unwrap()[1];
        assert_eq!(edited.attributes.get("message"), Some(&Value::from("edited")));

        let remove = factory.remove_collection("test:class:Comment", "sp1", &child, &owner);
        let change = DocChange::from_tx(&remove).unwrap();
        assert_eq!(resolver.patch(&mut parent, &spec, &change), LookupPatch::Patched);
        assert_eq!(parent.lookup["comments"].as_many().unwrap().len(), 1);
    }

    #[test]
    fn test_patch_reverse_unknown_member_needs_refresh() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let spec = LookupSpec::new().reverse("comments", "test:class:Comment");
        let mut parent = src.get(&"p1".into()).unwrap();
        resolver.resolve(&mut parent, &spec);

        let factory = TxFactory::new();
        let update = factory.update_collection(
            "test:class:Comment",
            "sp1",
            &"ghost".into(),
            &"p1".into(),
            DocumentUpdate::new().set("message", "?"),
        );
        let change = DocChange::from_tx(&update).unwrap();
        assert_eq!(resolver.patch(&mut parent, &spec, &change), LookupPatch::NeedsRefresh);
    }

    #[test]
    fn test_patch_forward_update_and_mixin() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let spec = LookupSpec::new().forward("attachedTo", "core:class:Space");
        let mut comment = src.get(&"c1".into()).unwrap();
        resolver.resolve(&mut comment, &spec);

        let factory = TxFactory::new();
        let update = factory.update_doc(
            "core:class:Space",
            "sp1",
            &"p1".into(),
            DocumentUpdate::new().set("name", "renamed"),
        );
        let change = DocChange::from_tx(&update).unwrap();
        assert_eq!(resolver.patch(&mut comment, &spec, &change), LookupPatch::Patched);
        let parent = comment.lookup["attachedTo"].as_one().unwrap();
        assert_eq!(parent.attributes.get("name"), Some(&Value::from("renamed")));

        let mixin = factory.create_mixin(&"p1".into(), "core:class:Space", "sp1", "test:mixin:M", [("x", 1i64)]);
        let change = DocChange::from_tx(&mixin).unwrap();
        assert_eq!(resolver.patch(&mut comment, &spec, &change), LookupPatch::Patched);
        assert!(comment.lookup["attachedTo"].as_one().unwrap().has_mixin(&"test:mixin:M".into()));

        let unrelated = Tx::RemoveDoc {
            id: "zzz".into(),
            class: "core:class:Space".into(),
            space: "sp1".into(),
            attached_to: None,
        };
        let change = DocChange::from_tx(&unrelated).unwrap();
        assert_eq!(resolver.patch(&mut comment, &spec, &change), LookupPatch::Unchanged);
    }

    #[test]
    fn test_patch_forward_malformed_needs_refresh() {
        let h = hierarchy();
        let src = source();
        let resolver = Resolver::new(&h, &src);
        let spec = LookupSpec::new().forward("attachedTo", "core:class:Space");
        let mut comment = src.get(&"c1".into()).unwrap();
        resolver.resolve(&mut comment, &spec);

        let factory = TxFactory::new();
        let update = factory.update_doc("core:class:Space", "sp1", &"p1".into(), DocumentUpdate::new().inc("name", 1i64));
        let change = DocChange::from_tx(&update).unwrap();
        assert_eq!(resolver.patch(&mut comment, &spec, &change), LookupPatch::NeedsRefresh);
    }
}
